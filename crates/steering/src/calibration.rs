//! Rack calibration state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Step of the calibration sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Initial sweep to the right limit
    SeekRight,
    /// Sweep to the left limit, where the tacho count is zeroed
    SeekLeft,
    /// Sweep back to the right limit to measure the rack
    MeasureRight,
}

impl fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationPhase::SeekRight => write!(f, "right limit"),
            CalibrationPhase::SeekLeft => write!(f, "left limit"),
            CalibrationPhase::MeasureRight => write!(f, "right limit (measuring)"),
        }
    }
}

/// Tacho count of the right limit, relative to the left limit at zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub most_right_tacho_count: i32,
}

impl CalibrationState {
    pub fn new(most_right_tacho_count: i32) -> Self {
        Self {
            most_right_tacho_count,
        }
    }

    /// Tacho target for a steering percentage (0 full right, 100 full left)
    ///
    /// Out-of-range input is clamped; NaN steers straight.
    pub fn percent_to_tacho(&self, percent: f32) -> i32 {
        let percent = if percent.is_nan() {
            50.0
        } else {
            f64::from(percent.clamp(0.0, 100.0))
        };
        (f64::from(self.most_right_tacho_count) * (100.0 - percent) / 100.0).round() as i32
    }
}
