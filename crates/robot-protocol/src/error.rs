//! Robot Error Types

use thiserror::Error;

/// Errors that can occur while talking to the robot
#[derive(Debug, Clone, Error)]
pub enum RobotError {
    /// No connection to the brick
    #[error("Robot is not connected")]
    NotConnected,

    /// Command could not be delivered or was rejected
    #[error("Hardware I/O error: {0}")]
    HardwareIo(String),
}
