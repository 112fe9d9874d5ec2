//! Robot Motor/Sensor Protocol
//!
//! The transport to the physical brick (Bluetooth or USB) lives outside this
//! workspace. This crate defines the contract the steering controller drives,
//! plus a deterministic simulated robot for tests and offline runs.

mod angle;
mod driver;
mod error;
mod simulated;

pub use angle::raw_to_percent;
pub use driver::{MotorPort, MotorSensorDriver};
pub use error::RobotError;
pub use simulated::{Command, SimulatedConfig, SimulatedRobot};

/// Motor power limits
pub mod power {
    /// Full power
    pub const MAX: u8 = 100;
    /// Power used to sweep the steering rack during calibration
    pub const STEERING_SWEEP: u8 = 20;
}
