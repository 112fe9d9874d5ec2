//! Steering Error Types

use crate::CalibrationPhase;
use robot_protocol::RobotError;
use thiserror::Error;

/// Errors raised by the steering controller
#[derive(Debug, Error)]
pub enum SteeringError {
    #[error("Steering has not been calibrated")]
    NotCalibrated,

    #[error("A steering loop is already running")]
    LoopAlreadyRunning,

    /// A limit switch never triggered
    #[error("Gave up waiting for {phase} after {waited_ms}ms")]
    HardwareTimeout {
        phase: CalibrationPhase,
        waited_ms: u64,
    },

    #[error("Robot error: {0}")]
    Hardware(RobotError),

    /// The loop thread panicked while holding the driver
    #[error("Steering loop panicked")]
    LoopPanicked,
}

impl From<RobotError> for SteeringError {
    fn from(err: RobotError) -> Self {
        SteeringError::Hardware(err)
    }
}
