//! Feature Engineering Engine
//!
//! Turns a captured frame and a user-drawn region of interest into the single
//! grayscale scan-line the steering model consumes.

mod features;
mod region;
mod strip;

pub use features::{ExtractedRow, FeatureExtractor, FeatureVector, GrayRow};
pub use region::{BoundingBox, Point, RegionOfInterest, SourceRegion};
pub use strip::{render_strip, save_strip, STRIP_REPEAT};

use thiserror::Error;

/// Errors during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Region of interest is degenerate or lies outside the frame
    #[error("Geometry error: {0}")]
    Geometry(String),
    /// Visualization strip could not be written
    #[error("Strip render failed: {0}")]
    Render(String),
}
