//! Driver contract consumed by the steering controller

use crate::RobotError;
use serde::{Deserialize, Serialize};

/// Motor channel on the brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorPort {
    /// Front steering rack (port A on the reference build)
    Steering,
    /// Rear drive motor (port C on the reference build)
    Driving,
}

/// Commands and sensor reads the robot hardware must support
///
/// Steering convention: running the steering motor forward turns left,
/// backward turns right. The drive motor moves the robot ahead when run
/// backward, which is hidden behind `drive_forward` on `MotorPort::Driving`
/// by implementations.
pub trait MotorSensorDriver: Send {
    /// Open the connection; false means the caller may offer a retry
    fn connect(&mut self) -> bool;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Set motor power, 0-100
    fn try_set_power(&mut self, port: MotorPort, percent: u8) -> Result<(), RobotError>;

    fn drive_forward(&mut self, port: MotorPort) -> Result<(), RobotError>;

    fn drive_backward(&mut self, port: MotorPort) -> Result<(), RobotError>;

    fn stop(&mut self, port: MotorPort) -> Result<(), RobotError>;

    fn reset_tacho_count(&mut self, port: MotorPort) -> Result<(), RobotError>;

    /// Rotate to an absolute tacho count; `blocking` waits for the move to end
    fn rotate_to_tacho_count(
        &mut self,
        port: MotorPort,
        target: i32,
        blocking: bool,
    ) -> Result<(), RobotError>;

    fn current_tacho_count(&mut self, port: MotorPort) -> Result<i32, RobotError>;

    /// Left limit switch of the steering rack
    fn is_at_left_limit(&mut self) -> Result<bool, RobotError>;

    /// Right limit switch of the steering rack
    fn is_at_right_limit(&mut self) -> Result<bool, RobotError>;

    /// Steering wheel angle sensor, 0 (full right) to 100 (full left)
    fn current_sensor_angle(&mut self) -> Result<f32, RobotError>;
}

impl<D: MotorSensorDriver + ?Sized> MotorSensorDriver for Box<D> {
    fn connect(&mut self) -> bool {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn try_set_power(&mut self, port: MotorPort, percent: u8) -> Result<(), RobotError> {
        (**self).try_set_power(port, percent)
    }

    fn drive_forward(&mut self, port: MotorPort) -> Result<(), RobotError> {
        (**self).drive_forward(port)
    }

    fn drive_backward(&mut self, port: MotorPort) -> Result<(), RobotError> {
        (**self).drive_backward(port)
    }

    fn stop(&mut self, port: MotorPort) -> Result<(), RobotError> {
        (**self).stop(port)
    }

    fn reset_tacho_count(&mut self, port: MotorPort) -> Result<(), RobotError> {
        (**self).reset_tacho_count(port)
    }

    fn rotate_to_tacho_count(
        &mut self,
        port: MotorPort,
        target: i32,
        blocking: bool,
    ) -> Result<(), RobotError> {
        (**self).rotate_to_tacho_count(port, target, blocking)
    }

    fn current_tacho_count(&mut self, port: MotorPort) -> Result<i32, RobotError> {
        (**self).current_tacho_count(port)
    }

    fn is_at_left_limit(&mut self) -> Result<bool, RobotError> {
        (**self).is_at_left_limit()
    }

    fn is_at_right_limit(&mut self) -> Result<bool, RobotError> {
        (**self).is_at_right_limit()
    }

    fn current_sensor_angle(&mut self) -> Result<f32, RobotError> {
        (**self).current_sensor_angle()
    }
}
