//! Autopilot
//!
//! Wires the camera, feature extraction, training and steering crates into
//! the three sessions of a run: collect labelled samples while a person
//! steers, train a model on them, then let the model drive.

pub mod collect;
pub mod config;
pub mod drive;
mod logging;
mod robot;
pub mod train;

pub use collect::{run_collect, CollectSummary, DataCollector};
pub use config::{AutopilotConfig, ExistingSamples};
pub use drive::{run_drive, DriveSummary, ModelAngleSource};
pub use logging::init_logging;
pub use robot::{prepare_robot, release_robot};
pub use train::{train_model, TrainSummary};
