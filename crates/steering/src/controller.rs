//! Steering controller and its background loop

use crate::{CalibrationPhase, CalibrationState, SteeringConfig, SteeringError};
use robot_protocol::{MotorPort, MotorSensorDriver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// Supplies the steering percentage for each loop iteration
///
/// `Ok(None)` skips the iteration without moving the rack. An `Err` ends the
/// loop.
pub trait AngleSource: Send {
    fn next_angle(&mut self) -> Result<Option<f32>, SteeringError>;
}

/// Reads the steering wheel angle sensor
struct SensorAngle<D> {
    driver: Arc<Mutex<D>>,
}

impl<D: MotorSensorDriver> AngleSource for SensorAngle<D> {
    fn next_angle(&mut self) -> Result<Option<f32>, SteeringError> {
        let angle = lock(&self.driver)?.current_sensor_angle()?;
        Ok(Some(angle))
    }
}

fn lock<D>(driver: &Mutex<D>) -> Result<MutexGuard<'_, D>, SteeringError> {
    driver.lock().map_err(|_| SteeringError::LoopPanicked)
}

/// Owns the robot driver and at most one steering loop
pub struct SteeringController<D: MotorSensorDriver + 'static> {
    driver: Arc<Mutex<D>>,
    config: SteeringConfig,
    calibration: Option<CalibrationState>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<(), SteeringError>>>,
}

impl<D: MotorSensorDriver + 'static> SteeringController<D> {
    pub fn new(driver: D, config: SteeringConfig) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            config,
            calibration: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn config(&self) -> &SteeringConfig {
        &self.config
    }

    pub fn calibration(&self) -> Option<CalibrationState> {
        self.calibration
    }

    /// Whether a loop is currently steering
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Run `f` against the driver
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> Result<R, SteeringError> {
        let mut driver = lock(&self.driver)?;
        Ok(f(&mut driver))
    }

    pub fn connect(&mut self) -> bool {
        match lock(&self.driver) {
            Ok(mut driver) => {
                let connected = driver.connect();
                if connected {
                    info!("Robot connected");
                } else {
                    warn!("Robot connection failed");
                }
                connected
            }
            Err(e) => {
                error!("Cannot connect: {}", e);
                false
            }
        }
    }

    /// Stop any loop and close the connection
    pub fn disconnect(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Steering loop ended with error: {}", e);
        }
        if let Ok(mut driver) = lock(&self.driver) {
            driver.disconnect();
        }
        info!("Robot disconnected");
    }

    /// Sweep the rack between its limit switches and centre it
    pub fn calibrate(&mut self) -> Result<CalibrationState, SteeringError> {
        if self.worker.is_some() {
            return Err(SteeringError::LoopAlreadyRunning);
        }
        info!("Calibrating steering rack");

        let result = self.sweep();
        if result.is_err() {
            if let Ok(mut driver) = lock(&self.driver) {
                if let Err(e) = driver.stop(MotorPort::Steering) {
                    warn!("Failed to stop steering motor: {}", e);
                }
            }
        }
        let state = result?;

        let center = state.percent_to_tacho(50.0);
        lock(&self.driver)?.rotate_to_tacho_count(MotorPort::Steering, center, true)?;

        self.calibration = Some(state);
        info!(
            "Steering calibrated: most right tacho count {}",
            state.most_right_tacho_count
        );
        Ok(state)
    }

    fn sweep(&self) -> Result<CalibrationState, SteeringError> {
        lock(&self.driver)?.try_set_power(MotorPort::Steering, self.config.steering_power)?;

        let at_right = lock(&self.driver)?.is_at_right_limit()?;
        if at_right {
            debug!("Rack already at the right limit");
        } else {
            lock(&self.driver)?.drive_backward(MotorPort::Steering)?;
            self.wait_for_limit(CalibrationPhase::SeekRight, |d| d.is_at_right_limit())?;
            lock(&self.driver)?.stop(MotorPort::Steering)?;
        }

        lock(&self.driver)?.drive_forward(MotorPort::Steering)?;
        self.wait_for_limit(CalibrationPhase::SeekLeft, |d| d.is_at_left_limit())?;
        {
            let mut driver = lock(&self.driver)?;
            driver.stop(MotorPort::Steering)?;
            driver.reset_tacho_count(MotorPort::Steering)?;
        }

        lock(&self.driver)?.drive_backward(MotorPort::Steering)?;
        self.wait_for_limit(CalibrationPhase::MeasureRight, |d| d.is_at_right_limit())?;
        let mut driver = lock(&self.driver)?;
        driver.stop(MotorPort::Steering)?;
        let most_right = driver.current_tacho_count(MotorPort::Steering)?;

        Ok(CalibrationState::new(most_right))
    }

    fn wait_for_limit<F>(
        &self,
        phase: CalibrationPhase,
        mut at_limit: F,
    ) -> Result<(), SteeringError>
    where
        F: FnMut(&mut D) -> Result<bool, robot_protocol::RobotError>,
    {
        let started = Instant::now();
        loop {
            if at_limit(&mut *lock(&self.driver)?)? {
                debug!("Reached {} after {:?}", phase, started.elapsed());
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= self.config.limit_timeout() {
                error!("Timed out waiting for {}", phase);
                return Err(SteeringError::HardwareTimeout {
                    phase,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    /// Tacho target for a steering percentage
    pub fn percent_to_tacho(&self, percent: f32) -> Result<i32, SteeringError> {
        self.calibration
            .map(|state| state.percent_to_tacho(percent))
            .ok_or(SteeringError::NotCalibrated)
    }

    /// Follow the steering wheel sensor; each applied angle is sent on `on_steered`
    pub fn start_manual_steering(
        &mut self,
        on_steered: mpsc::Sender<f32>,
    ) -> Result<(), SteeringError> {
        let source = SensorAngle {
            driver: self.driver.clone(),
        };
        self.spawn_loop("manual", source, on_steered)
    }

    /// Steer with angles from `source`, typically model predictions
    pub fn drive_with_model<S>(
        &mut self,
        source: S,
        on_steered: mpsc::Sender<f32>,
    ) -> Result<(), SteeringError>
    where
        S: AngleSource + 'static,
    {
        self.spawn_loop("model", source, on_steered)
    }

    fn spawn_loop<S>(
        &mut self,
        mode: &'static str,
        source: S,
        on_steered: mpsc::Sender<f32>,
    ) -> Result<(), SteeringError>
    where
        S: AngleSource + 'static,
    {
        if self.worker.is_some() {
            return Err(SteeringError::LoopAlreadyRunning);
        }
        let calibration = self.calibration.ok_or(SteeringError::NotCalibrated)?;

        {
            let mut driver = lock(&self.driver)?;
            driver.try_set_power(MotorPort::Driving, self.config.driving_power)?;
            driver.drive_forward(MotorPort::Driving)?;
        }

        self.running.store(true, Ordering::SeqCst);
        let driver = self.driver.clone();
        let running = self.running.clone();
        let interval = self.config.loop_interval();

        info!("Starting {} steering loop", mode);
        self.worker = Some(thread::spawn(move || {
            let result =
                steering_loop(&driver, calibration, source, &running, &on_steered, interval);
            running.store(false, Ordering::SeqCst);
            match &result {
                Ok(()) => info!("{} steering loop stopped", mode),
                Err(e) => error!("{} steering loop failed: {}", mode, e),
            }
            result
        }));
        Ok(())
    }

    /// Stop the loop and both motors
    ///
    /// Returns the error that ended the loop, if any. Motor stop failures
    /// are only logged.
    pub fn stop(&mut self) -> Result<(), SteeringError> {
        self.running.store(false, Ordering::SeqCst);
        let outcome = match self.worker.take() {
            Some(handle) => handle.join().unwrap_or(Err(SteeringError::LoopPanicked)),
            None => Ok(()),
        };

        if let Ok(mut driver) = lock(&self.driver) {
            if driver.is_connected() {
                for port in [MotorPort::Driving, MotorPort::Steering] {
                    if let Err(e) = driver.stop(port) {
                        warn!("Failed to stop {:?} motor: {}", port, e);
                    }
                }
            }
        }
        outcome
    }
}

impl<D: MotorSensorDriver + 'static> Drop for SteeringController<D> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn steering_loop<D, S>(
    driver: &Mutex<D>,
    calibration: CalibrationState,
    mut source: S,
    running: &AtomicBool,
    on_steered: &mpsc::Sender<f32>,
    interval: Duration,
) -> Result<(), SteeringError>
where
    D: MotorSensorDriver,
    S: AngleSource,
{
    while running.load(Ordering::SeqCst) {
        if let Some(angle) = source.next_angle()? {
            let target = calibration.percent_to_tacho(angle);
            lock(driver)?.rotate_to_tacho_count(MotorPort::Steering, target, true)?;
            debug!("Steered to {:.1}% (tacho {})", angle, target);

            match on_steered.try_send(angle) {
                Ok(()) | Err(TrySendError::Closed(_)) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("Steered-angle receiver lagging, dropped {:.1}", angle)
                }
            }
        }
        thread::sleep(interval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_protocol::{Command, RobotError, SimulatedConfig, SimulatedRobot};
    use std::collections::VecDeque;

    fn controller(sensor_angles: Vec<f32>) -> SteeringController<SimulatedRobot> {
        let robot = SimulatedRobot::new(SimulatedConfig {
            sensor_angles,
            ..Default::default()
        });
        let mut controller = SteeringController::new(robot, SteeringConfig::simulation());
        assert!(controller.connect());
        controller
    }

    fn wait_until_stopped(controller: &SteeringController<SimulatedRobot>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.is_running() {
            assert!(Instant::now() < deadline, "loop did not end");
            thread::sleep(Duration::from_millis(1));
        }
    }

    struct Scripted(VecDeque<Option<f32>>);

    impl AngleSource for Scripted {
        fn next_angle(&mut self) -> Result<Option<f32>, SteeringError> {
            let next = self.0.pop_front().unwrap_or(None);
            self.0.push_back(next);
            Ok(next)
        }
    }

    #[test]
    fn test_calibration_measures_rack() {
        let mut controller = controller(vec![50.0]);
        let state = controller.calibrate().unwrap();

        assert_eq!(state.most_right_tacho_count, -200);
        assert_eq!(controller.calibration(), Some(state));
        controller
            .with_driver(|robot| {
                assert_eq!(robot.commands()[0], Command::SetPower(MotorPort::Steering, 20));
                assert_eq!(robot.rack_position(), 100);
                assert!(!robot.is_steering_moving());
            })
            .unwrap();
    }

    #[test]
    fn test_jammed_rack_times_out() {
        let mut robot = SimulatedRobot::default();
        robot.connect();
        robot.set_jammed(true);
        let config = SteeringConfig {
            limit_timeout_ms: 50,
            ..SteeringConfig::simulation()
        };
        let mut controller = SteeringController::new(robot, config);

        let result = controller.calibrate();
        assert!(matches!(
            result,
            Err(SteeringError::HardwareTimeout {
                phase: CalibrationPhase::SeekRight,
                ..
            })
        ));
        assert!(controller.calibration().is_none());
        assert!(!controller.with_driver(|robot| robot.is_steering_moving()).unwrap());
    }

    fn short_timeout_controller(robot: SimulatedRobot) -> SteeringController<SimulatedRobot> {
        let config = SteeringConfig {
            limit_timeout_ms: 50,
            ..SteeringConfig::simulation()
        };
        let mut controller = SteeringController::new(robot, config);
        assert!(controller.connect());
        controller
    }

    #[test]
    fn test_calibration_from_right_limit() {
        let robot = SimulatedRobot::new(SimulatedConfig {
            start_position: 0,
            ..Default::default()
        });
        let mut controller = SteeringController::new(robot, SteeringConfig::simulation());
        assert!(controller.connect());

        let state = controller.calibrate().unwrap();
        assert_eq!(state.most_right_tacho_count, -200);
        controller
            .with_driver(|robot| {
                let commands = robot.commands();
                assert_eq!(
                    &commands[..2],
                    &[
                        Command::SetPower(MotorPort::Steering, 20),
                        Command::Forward(MotorPort::Steering)
                    ]
                );
                assert_eq!(robot.rack_position(), 100);
            })
            .unwrap();
    }

    #[test]
    fn test_jam_while_seeking_left() {
        let mut robot = SimulatedRobot::new(SimulatedConfig {
            start_position: 0,
            ..Default::default()
        });
        robot.set_jammed(true);
        let mut controller = short_timeout_controller(robot);

        assert!(matches!(
            controller.calibrate(),
            Err(SteeringError::HardwareTimeout {
                phase: CalibrationPhase::SeekLeft,
                ..
            })
        ));
        assert!(controller.calibration().is_none());
        assert!(!controller.with_driver(|robot| robot.is_steering_moving()).unwrap());
    }

    #[test]
    fn test_jam_while_measuring_right() {
        let mut robot = SimulatedRobot::default();
        robot.jam_at_left_limit();
        let mut controller = short_timeout_controller(robot);

        assert!(matches!(
            controller.calibrate(),
            Err(SteeringError::HardwareTimeout {
                phase: CalibrationPhase::MeasureRight,
                ..
            })
        ));
        controller
            .with_driver(|robot| {
                assert!(robot.commands().contains(&Command::ResetTacho(MotorPort::Steering)));
                assert_eq!(robot.rack_position(), 200);
                assert!(!robot.is_steering_moving());
            })
            .unwrap();
    }

    #[test]
    fn test_calibration_requires_connection() {
        let mut controller =
            SteeringController::new(SimulatedRobot::default(), SteeringConfig::simulation());
        assert!(matches!(
            controller.calibrate(),
            Err(SteeringError::Hardware(RobotError::NotConnected))
        ));
    }

    #[test]
    fn test_percent_to_tacho_needs_calibration() {
        let mut controller = controller(vec![50.0]);
        assert!(matches!(controller.percent_to_tacho(50.0), Err(SteeringError::NotCalibrated)));

        controller.calibrate().unwrap();
        assert_eq!(controller.percent_to_tacho(0.0).unwrap(), -200);
        assert_eq!(controller.percent_to_tacho(100.0).unwrap(), 0);
        assert_eq!(controller.percent_to_tacho(25.0).unwrap(), -150);
    }

    #[test]
    fn test_loop_needs_calibration() {
        let mut controller = controller(vec![50.0]);
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            controller.start_manual_steering(tx),
            Err(SteeringError::NotCalibrated)
        ));
        assert!(controller.with_driver(|robot| robot.commands().is_empty()).unwrap());
    }

    #[test]
    fn test_manual_steering_follows_sensor() {
        let mut controller = controller(vec![25.0, 75.0]);
        controller.calibrate().unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        controller.start_manual_steering(tx).unwrap();
        assert!(controller.is_running());
        assert_eq!(rx.blocking_recv(), Some(25.0));
        assert_eq!(rx.blocking_recv(), Some(75.0));
        controller.stop().unwrap();
        assert!(!controller.is_running());

        controller
            .with_driver(|robot| {
                let commands = robot.commands();
                assert!(commands.contains(&Command::RotateTo(MotorPort::Steering, -150)));
                assert!(commands.contains(&Command::RotateTo(MotorPort::Steering, -50)));
                assert!(commands.contains(&Command::Forward(MotorPort::Driving)));
                assert!(!robot.is_driving());
            })
            .unwrap();
    }

    #[test]
    fn test_only_one_loop() {
        let mut controller = controller(vec![50.0]);
        controller.calibrate().unwrap();
        let (tx, _rx) = mpsc::channel(8);

        controller.start_manual_steering(tx.clone()).unwrap();
        assert!(matches!(
            controller.drive_with_model(Scripted(VecDeque::from(vec![Some(10.0)])), tx),
            Err(SteeringError::LoopAlreadyRunning)
        ));
        assert!(matches!(controller.calibrate(), Err(SteeringError::LoopAlreadyRunning)));
        controller.stop().unwrap();
    }

    #[test]
    fn test_model_loop_skips_missing_angles() {
        let mut controller = controller(vec![50.0]);
        controller.calibrate().unwrap();
        controller.with_driver(|robot| robot.clear_commands()).unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        let source = Scripted(VecDeque::from(vec![None, Some(60.0), None]));
        controller.drive_with_model(source, tx).unwrap();
        assert_eq!(rx.blocking_recv(), Some(60.0));
        assert_eq!(rx.blocking_recv(), Some(60.0));
        controller.stop().unwrap();

        let rotations = controller
            .with_driver(|robot| {
                robot
                    .commands()
                    .iter()
                    .filter(|c| matches!(c, Command::RotateTo(..)))
                    .count()
            })
            .unwrap();
        assert!(rotations >= 2);
        assert_eq!(controller.percent_to_tacho(60.0).unwrap(), -80);
    }

    #[test]
    fn test_hardware_fault_surfaces_once() {
        let mut controller = controller(vec![40.0]);
        controller.calibrate().unwrap();
        // set power, drive forward, one sensor read, one rotation
        controller.with_driver(|robot| robot.fail_after(4)).unwrap();
        let (tx, _rx) = mpsc::channel(8);

        controller.start_manual_steering(tx).unwrap();
        wait_until_stopped(&controller);

        assert!(matches!(
            controller.stop(),
            Err(SteeringError::Hardware(RobotError::HardwareIo(_)))
        ));
        assert!(controller.stop().is_ok());
    }

    #[test]
    fn test_disconnect_stops_loop() {
        let mut controller = controller(vec![50.0]);
        controller.calibrate().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        controller.start_manual_steering(tx).unwrap();

        controller.disconnect();
        assert!(!controller.is_running());
        assert!(!controller.with_driver(|robot| robot.is_connected()).unwrap());
    }
}
