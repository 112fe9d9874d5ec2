//! Frame sources and the in-flight capture guard

use crate::frame::{PixelFormat, VideoFrame};
use crate::CameraError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Anything that can hand the core a captured frame
pub trait FrameSource: Send {
    /// Capture one frame
    fn capture(&mut self) -> Result<VideoFrame, CameraError>;
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).capture()
    }
}

/// Guard that allows at most one outstanding capture
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CaptureGuard {
    in_flight: Arc<AtomicBool>,
}

impl CaptureGuard {
    /// Create an idle guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the capture slot, or None if a capture is outstanding
    pub fn try_acquire(&self) -> Option<CapturePermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CapturePermit {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    /// Whether a capture is outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held while a capture is outstanding; releases the slot on drop
#[derive(Debug)]
pub struct CapturePermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for CapturePermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Deterministic camera that renders a dark lane line on a bright floor
///
/// The lane's horizontal position (0.0 = left edge, 1.0 = right edge) follows
/// a script that repeats once exhausted.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    lane_positions: Vec<f32>,
    lane_width: u32,
    floor: u8,
    lane: u8,
    sequence: u32,
    fail_every: Option<u32>,
}

impl SyntheticCamera {
    /// Create a camera producing `width` x `height` RGB frames
    pub fn new(width: u32, height: u32, lane_positions: Vec<f32>) -> Self {
        Self {
            width,
            height,
            lane_positions: if lane_positions.is_empty() {
                vec![0.5]
            } else {
                lane_positions
            },
            lane_width: (width / 10).max(1),
            floor: 200,
            lane: 30,
            sequence: 0,
            fail_every: None,
        }
    }

    /// Make every `n`th capture time out
    pub fn failing_every(mut self, n: u32) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Lane position used for the frame with the given sequence number
    pub fn lane_position(&self, sequence: u32) -> f32 {
        self.lane_positions[sequence as usize % self.lane_positions.len()].clamp(0.0, 1.0)
    }

    /// Number of captures attempted so far
    pub fn captures(&self) -> u32 {
        self.sequence
    }

    fn render(&self, sequence: u32) -> VideoFrame {
        let center = (self.lane_position(sequence) * (self.width.saturating_sub(1)) as f32) as i64;
        let half = (self.lane_width / 2) as i64;

        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for _y in 0..self.height {
            for x in 0..self.width as i64 {
                let value = if (x - center).abs() <= half {
                    self.lane
                } else {
                    self.floor
                };
                data.extend_from_slice(&[value, value, value]);
            }
        }

        VideoFrame {
            data,
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb24,
            timestamp_ns: sequence as u64 * 33_000_000,
            sequence,
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        if let Some(n) = self.fail_every {
            if (sequence + 1) % n == 0 {
                debug!("Synthetic capture {} timed out", sequence);
                return Err(CameraError::Timeout);
            }
        }

        Ok(self.render(sequence))
    }
}
