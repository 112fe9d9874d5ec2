//! Steering configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for calibration and the steering loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Steering motor power while sweeping the rack (default: 20)
    pub steering_power: u8,
    /// Drive motor power while a steering loop runs
    pub driving_power: u8,
    /// Delay between limit switch polls in milliseconds
    pub poll_interval_ms: u64,
    /// Give up on a limit switch after this many milliseconds
    pub limit_timeout_ms: u64,
    /// Delay between steering loop iterations in milliseconds
    pub loop_interval_ms: u64,
    /// Capacity of the steered-angle channel
    pub channel_capacity: usize,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            steering_power: robot_protocol::power::STEERING_SWEEP,
            driving_power: 40,
            poll_interval_ms: 10,
            limit_timeout_ms: 5000,
            loop_interval_ms: 50,
            channel_capacity: 32,
        }
    }
}

impl SteeringConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn limit_timeout(&self) -> Duration {
        Duration::from_millis(self.limit_timeout_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    /// Fast timings for the simulated robot
    pub fn simulation() -> Self {
        Self {
            poll_interval_ms: 1,
            limit_timeout_ms: 1000,
            loop_interval_ms: 5,
            ..Default::default()
        }
    }
}
