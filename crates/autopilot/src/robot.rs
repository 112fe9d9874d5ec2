//! Robot setup and teardown around a session
//!
//! Calibration polls limit switches with sleeps, so it runs on the blocking
//! pool rather than on a runtime worker.

use anyhow::{anyhow, bail, Context, Result};
use robot_protocol::MotorSensorDriver;
use steering::SteeringController;
use tracing::info;

/// Connect and calibrate, handing the controller back ready to steer
pub async fn prepare_robot<D>(mut controller: SteeringController<D>) -> Result<SteeringController<D>>
where
    D: MotorSensorDriver + 'static,
{
    tokio::task::spawn_blocking(move || {
        if !controller.connect() {
            bail!("Unable to connect to robot");
        }
        let state = controller
            .calibrate()
            .context("Steering calibration failed")?;
        info!(
            "Robot ready (rack measures {} tacho counts)",
            state.most_right_tacho_count
        );
        Ok(controller)
    })
    .await
    .map_err(|e| anyhow!("Calibration task failed: {}", e))?
}

/// Stop the steering loop and disconnect
///
/// Returns the error that ended the loop, if it failed.
pub async fn release_robot<D>(mut controller: SteeringController<D>) -> Result<()>
where
    D: MotorSensorDriver + 'static,
{
    tokio::task::spawn_blocking(move || {
        let stopped = controller.stop();
        controller.disconnect();
        stopped.context("Steering loop failed")
    })
    .await
    .map_err(|e| anyhow!("Shutdown task failed: {}", e))?
}
