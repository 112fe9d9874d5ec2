//! Simulated robot for tests and offline runs (no hardware required)
//!
//! The steering rack is a position in `0..=rack_span` ticks. Running the
//! steering motor forward moves it towards the left limit, backward towards
//! the right limit. Free-running motion advances only when the rack is
//! polled, which keeps every run deterministic.

use crate::{MotorPort, MotorSensorDriver, RobotError};
use tracing::{debug, info, warn};

/// Motor command as observed by the simulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetPower(MotorPort, u8),
    Forward(MotorPort),
    Backward(MotorPort),
    Stop(MotorPort),
    ResetTacho(MotorPort),
    RotateTo(MotorPort, i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Stopped,
    Forward,
    Backward,
}

/// Simulator setup
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Ticks between the right and the left limit switch
    pub rack_span: i32,
    /// Rack position at power-on, measured from the right limit
    pub start_position: i32,
    /// Ticks a running steering motor moves per poll
    pub ticks_per_poll: i32,
    /// Angle sensor readings, replayed in a cycle
    pub sensor_angles: Vec<f32>,
    /// Refuse every connection attempt
    pub refuse_connect: bool,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            rack_span: 200,
            start_position: 80,
            ticks_per_poll: 10,
            sensor_angles: vec![50.0],
            refuse_connect: false,
        }
    }
}

/// In-process stand-in for the robot brick
#[derive(Debug)]
pub struct SimulatedRobot {
    config: SimulatedConfig,
    connected: bool,
    position: i32,
    tacho_offset: i32,
    steering: Motion,
    driving: Motion,
    steering_power: u8,
    driving_power: u8,
    jammed: bool,
    jam_on_left_limit: bool,
    /// Calls left before every call fails
    calls_until_fault: Option<usize>,
    sensor_cursor: usize,
    commands: Vec<Command>,
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

impl SimulatedRobot {
    pub fn new(config: SimulatedConfig) -> Self {
        info!(
            "Creating simulated robot (rack span {} ticks, start {})",
            config.rack_span, config.start_position
        );
        let position = config.start_position.clamp(0, config.rack_span);
        Self {
            config,
            connected: false,
            position,
            tacho_offset: 0,
            steering: Motion::Stopped,
            driving: Motion::Stopped,
            steering_power: 0,
            driving_power: 0,
            jammed: false,
            jam_on_left_limit: false,
            calls_until_fault: None,
            sensor_cursor: 0,
            commands: Vec::new(),
        }
    }

    /// Rack position in ticks from the right limit
    pub fn rack_position(&self) -> i32 {
        self.position
    }

    pub fn rack_span(&self) -> i32 {
        self.config.rack_span
    }

    /// Every motor command accepted so far, oldest first
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// A jammed rack ignores every steering move
    pub fn set_jammed(&mut self, jammed: bool) {
        self.jammed = jammed;
    }

    /// Jam the rack as soon as it reaches the left limit switch
    pub fn jam_at_left_limit(&mut self) {
        self.jam_on_left_limit = true;
    }

    /// Let `calls` more driver calls succeed, then fail every call
    pub fn fail_after(&mut self, calls: usize) {
        self.calls_until_fault = Some(calls);
    }

    pub fn is_steering_moving(&self) -> bool {
        self.steering != Motion::Stopped
    }

    /// Whether the robot is rolling ahead
    pub fn is_driving(&self) -> bool {
        self.driving == Motion::Forward
    }

    pub fn power(&self, port: MotorPort) -> u8 {
        match port {
            MotorPort::Steering => self.steering_power,
            MotorPort::Driving => self.driving_power,
        }
    }

    fn check(&mut self) -> Result<(), RobotError> {
        if !self.connected {
            return Err(RobotError::NotConnected);
        }
        match self.calls_until_fault {
            Some(0) => {
                warn!("Simulated hardware fault");
                Err(RobotError::HardwareIo("simulated fault".to_string()))
            }
            Some(n) => {
                self.calls_until_fault = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record(&mut self, command: Command) {
        debug!("Simulated command {:?}", command);
        self.commands.push(command);
    }

    fn motion_mut(&mut self, port: MotorPort) -> &mut Motion {
        match port {
            MotorPort::Steering => &mut self.steering,
            MotorPort::Driving => &mut self.driving,
        }
    }

    /// Move a free-running rack by one poll step
    fn advance(&mut self) {
        if self.jammed {
            return;
        }
        let step = self.config.ticks_per_poll;
        self.position = match self.steering {
            Motion::Stopped => self.position,
            Motion::Forward => (self.position + step).min(self.config.rack_span),
            Motion::Backward => (self.position - step).max(0),
        };
        if self.jam_on_left_limit && self.position >= self.config.rack_span {
            debug!("Simulated rack jammed at the left limit");
            self.jammed = true;
        }
    }
}

impl MotorSensorDriver for SimulatedRobot {
    fn connect(&mut self) -> bool {
        if self.config.refuse_connect {
            warn!("Simulated robot refused connection");
            return false;
        }
        self.connected = true;
        info!("Simulated robot connected");
        true
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.steering = Motion::Stopped;
            self.driving = Motion::Stopped;
            info!("Simulated robot disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn try_set_power(&mut self, port: MotorPort, percent: u8) -> Result<(), RobotError> {
        self.check()?;
        let percent = percent.min(crate::power::MAX);
        match port {
            MotorPort::Steering => self.steering_power = percent,
            MotorPort::Driving => self.driving_power = percent,
        }
        self.record(Command::SetPower(port, percent));
        Ok(())
    }

    fn drive_forward(&mut self, port: MotorPort) -> Result<(), RobotError> {
        self.check()?;
        *self.motion_mut(port) = Motion::Forward;
        self.record(Command::Forward(port));
        Ok(())
    }

    fn drive_backward(&mut self, port: MotorPort) -> Result<(), RobotError> {
        self.check()?;
        *self.motion_mut(port) = Motion::Backward;
        self.record(Command::Backward(port));
        Ok(())
    }

    fn stop(&mut self, port: MotorPort) -> Result<(), RobotError> {
        self.check()?;
        *self.motion_mut(port) = Motion::Stopped;
        self.record(Command::Stop(port));
        Ok(())
    }

    fn reset_tacho_count(&mut self, port: MotorPort) -> Result<(), RobotError> {
        self.check()?;
        if port == MotorPort::Steering {
            self.tacho_offset = self.position;
        }
        self.record(Command::ResetTacho(port));
        Ok(())
    }

    fn rotate_to_tacho_count(
        &mut self,
        port: MotorPort,
        target: i32,
        _blocking: bool,
    ) -> Result<(), RobotError> {
        self.check()?;
        if port == MotorPort::Steering {
            self.steering = Motion::Stopped;
            if !self.jammed {
                self.position = (self.tacho_offset + target).clamp(0, self.config.rack_span);
            }
        }
        self.record(Command::RotateTo(port, target));
        Ok(())
    }

    fn current_tacho_count(&mut self, port: MotorPort) -> Result<i32, RobotError> {
        self.check()?;
        match port {
            MotorPort::Steering => {
                self.advance();
                Ok(self.position - self.tacho_offset)
            }
            MotorPort::Driving => Ok(0),
        }
    }

    fn is_at_left_limit(&mut self) -> Result<bool, RobotError> {
        self.check()?;
        self.advance();
        Ok(self.position >= self.config.rack_span)
    }

    fn is_at_right_limit(&mut self) -> Result<bool, RobotError> {
        self.check()?;
        self.advance();
        Ok(self.position <= 0)
    }

    fn current_sensor_angle(&mut self) -> Result<f32, RobotError> {
        self.check()?;
        let angles = &self.config.sensor_angles;
        if angles.is_empty() {
            return Ok(50.0);
        }
        let angle = angles[self.sensor_cursor % angles.len()];
        self.sensor_cursor += 1;
        Ok(angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SimulatedRobot {
        let mut robot = SimulatedRobot::default();
        assert!(robot.connect());
        robot
    }

    #[test]
    fn test_requires_connection() {
        let mut robot = SimulatedRobot::default();
        assert!(matches!(
            robot.drive_forward(MotorPort::Steering),
            Err(RobotError::NotConnected)
        ));
        assert!(robot.commands().is_empty());
    }

    #[test]
    fn test_refused_connection() {
        let mut robot = SimulatedRobot::new(SimulatedConfig {
            refuse_connect: true,
            ..Default::default()
        });
        assert!(!robot.connect());
        assert!(!robot.is_connected());
    }

    #[test]
    fn test_rack_reaches_limits_when_polled() {
        let mut robot = connected();
        robot.drive_backward(MotorPort::Steering).unwrap();

        let mut polls = 0;
        while !robot.is_at_right_limit().unwrap() {
            polls += 1;
        }
        assert_eq!(polls, 7);
        assert_eq!(robot.rack_position(), 0);

        robot.drive_forward(MotorPort::Steering).unwrap();
        while !robot.is_at_left_limit().unwrap() {}
        assert_eq!(robot.rack_position(), 200);
    }

    #[test]
    fn test_tacho_is_relative_to_reset() {
        let mut robot = connected();
        robot.reset_tacho_count(MotorPort::Steering).unwrap();
        robot.rotate_to_tacho_count(MotorPort::Steering, 40, true).unwrap();
        assert_eq!(robot.rack_position(), 120);
        assert_eq!(robot.current_tacho_count(MotorPort::Steering).unwrap(), 40);

        robot.rotate_to_tacho_count(MotorPort::Steering, -500, true).unwrap();
        assert_eq!(robot.rack_position(), 0);
    }

    #[test]
    fn test_jammed_rack_does_not_move() {
        let mut robot = connected();
        robot.set_jammed(true);
        robot.drive_forward(MotorPort::Steering).unwrap();
        for _ in 0..50 {
            assert!(!robot.is_at_left_limit().unwrap());
        }
        assert_eq!(robot.rack_position(), 80);
    }

    #[test]
    fn test_jam_at_left_limit() {
        let mut robot = connected();
        robot.jam_at_left_limit();
        robot.drive_forward(MotorPort::Steering).unwrap();
        while !robot.is_at_left_limit().unwrap() {}

        robot.drive_backward(MotorPort::Steering).unwrap();
        for _ in 0..50 {
            assert!(!robot.is_at_right_limit().unwrap());
        }
        assert_eq!(robot.rack_position(), 200);
    }

    #[test]
    fn test_fault_injection() {
        let mut robot = connected();
        robot.fail_after(2);
        robot.stop(MotorPort::Driving).unwrap();
        robot.current_sensor_angle().unwrap();
        assert!(matches!(
            robot.stop(MotorPort::Driving),
            Err(RobotError::HardwareIo(_))
        ));
    }

    #[test]
    fn test_sensor_script_cycles() {
        let mut robot = SimulatedRobot::new(SimulatedConfig {
            sensor_angles: vec![10.0, 90.0],
            ..Default::default()
        });
        robot.connect();
        let read: Vec<f32> = (0..3).map(|_| robot.current_sensor_angle().unwrap()).collect();
        assert_eq!(read, vec![10.0, 90.0, 10.0]);
    }

    #[test]
    fn test_command_log() {
        let mut robot = connected();
        robot.try_set_power(MotorPort::Driving, 150).unwrap();
        robot.drive_forward(MotorPort::Driving).unwrap();
        assert!(robot.is_driving());
        assert_eq!(robot.power(MotorPort::Driving), 100);
        assert_eq!(
            robot.commands(),
            &[
                Command::SetPower(MotorPort::Driving, 100),
                Command::Forward(MotorPort::Driving)
            ]
        );
    }
}
