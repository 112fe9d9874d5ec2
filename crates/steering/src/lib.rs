//! Steering Control
//!
//! Calibrates the steering rack against its limit switches and runs the
//! background loop that turns steering percentages into rack positions.

mod calibration;
mod config;
mod controller;
mod error;

pub use calibration::{CalibrationPhase, CalibrationState};
pub use config::SteeringConfig;
pub use controller::{AngleSource, SteeringController};
pub use error::SteeringError;
