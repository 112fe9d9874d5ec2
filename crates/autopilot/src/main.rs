//! Autopilot - Main Entry Point
//!
//! Runs a session against the simulated robot and synthetic camera:
//!
//! ```text
//! autopilot collect <name>
//! autopilot train <name>
//! autopilot drive <name>
//! ```

use anyhow::{bail, Context, Result};
use autopilot::{init_logging, run_collect, run_drive, train_model, AutopilotConfig};
use std::path::PathBuf;
use steering::SteeringController;
use tracing::info;

const USAGE: &str = "usage: autopilot <collect|train|drive> <name> [config.toml]";

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler: run until the session's own deadline
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, name, config_path) = match args.as_slice() {
        [command, name] => (command.as_str(), name.as_str(), None),
        [command, name, path] => (command.as_str(), name.as_str(), Some(PathBuf::from(path))),
        _ => bail!(USAGE),
    };

    let config =
        AutopilotConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("=== Autopilot v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.data_dir.display());

    let simulation = &config.simulation;
    match command {
        "collect" => {
            let controller = SteeringController::new(simulation.robot(), config.steering.clone());
            let camera = simulation.camera();
            let summary = run_collect(&config, name, controller, camera, shutdown_signal()).await?;
            info!("Collection done: {:?}", summary);
        }
        "train" => {
            let summary = train_model(&config, name, shutdown_signal()).await?;
            info!("Training done: {:?}", summary);
        }
        "drive" => {
            let controller = SteeringController::new(simulation.robot(), config.steering.clone());
            let camera = simulation.camera();
            let summary = run_drive(&config, name, controller, camera, shutdown_signal()).await?;
            info!("Drive done: {:?}", summary);
        }
        other => bail!("unknown command {:?}; {}", other, USAGE),
    }

    Ok(())
}
