//! Camera Capture Library for the Steering Robot
//!
//! The phone/camera stack is an external collaborator; this crate defines what
//! the core receives from it:
//! - Raw RGB or grayscale frames with their geometry
//! - A `FrameSource` seam for anything that can deliver frames
//! - The single in-flight capture guard
//! - A deterministic synthetic camera for simulation and tests

pub mod frame;
pub mod source;

pub use frame::{PixelFormat, VideoFrame};
pub use source::{CaptureGuard, CapturePermit, FrameSource, SyntheticCamera};

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Capture timeout")]
    Timeout,
}

/// Geometry of the camera preview the region of interest is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewGeometry {
    /// Preview width in view pixels
    pub width: u32,
    /// Preview height in view pixels
    pub height: u32,
}

impl ViewGeometry {
    /// Create a view geometry
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ViewGeometry {
    fn default() -> Self {
        // Portrait phone preview
        Self {
            width: 1080,
            height: 1440,
        }
    }
}
