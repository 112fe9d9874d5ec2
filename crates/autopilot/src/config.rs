//! Application configuration
//!
//! Values come from serde defaults, overridden by an optional TOML file and
//! then by `AUTOPILOT_*` environment variables (`__` separates sections, e.g.
//! `AUTOPILOT_TRAINING__ITERATIONS=2000`).

use camera_capture::{SyntheticCamera, ViewGeometry};
use config::{Config, ConfigError, Environment, File};
use feature_engine::{Point, RegionOfInterest};
use regression_engine::LabelScale;
use robot_protocol::{SimulatedConfig, SimulatedRobot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use steering::SteeringConfig;
use storage::MirrorPolicy;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Directory holding `<name>_data.csv` and `<name>_model.json`
    pub data_dir: PathBuf,
    pub view: ViewConfig,
    pub region: RegionConfig,
    pub collect: CollectConfig,
    pub training: TrainingConfig,
    pub steering: SteeringConfig,
    pub session: SessionConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("models"),
            view: ViewConfig::default(),
            region: RegionConfig::default(),
            collect: CollectConfig::default(),
            training: TrainingConfig::default(),
            steering: SteeringConfig::default(),
            session: SessionConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AutopilotConfig {
    pub const DEFAULT_PATH: &'static str = "autopilot.toml";

    /// Load configuration; `path` must exist when given, the default file is optional
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_PATH));

        Config::builder()
            .add_source(File::from(file).required(path.is_some()))
            .add_source(
                Environment::with_prefix("AUTOPILOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Size of the preview the region is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        let view = ViewGeometry::default();
        Self {
            width: view.width,
            height: view.height,
        }
    }
}

impl ViewConfig {
    pub fn geometry(&self) -> ViewGeometry {
        ViewGeometry::new(self.width, self.height)
    }
}

/// Region of interest corners in view coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub corners: [Point; 4],
}

impl Default for RegionConfig {
    fn default() -> Self {
        // A thin band across the lower part of the default view
        Self {
            corners: [
                Point::new(40, 900),
                Point::new(1040, 900),
                Point::new(40, 960),
                Point::new(1040, 960),
            ],
        }
    }
}

impl RegionConfig {
    pub fn roi(&self) -> RegionOfInterest {
        RegionOfInterest::new(self.corners)
    }
}

/// What to do when a run already has a sample file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingSamples {
    /// Abort the session
    #[default]
    Refuse,
    /// Delete the old file first
    Overwrite,
    /// Keep adding to it
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    /// Also store the left-right mirrored copy of every sample
    pub augment_mirrored: bool,
    pub mirror_policy: MirrorPolicy,
    pub existing_samples: ExistingSamples,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            augment_mirrored: true,
            mirror_policy: MirrorPolicy::default(),
            existing_samples: ExistingSamples::default(),
        }
    }
}

impl CollectConfig {
    /// Mirror policy to apply, if augmentation is on
    pub fn mirror(&self) -> Option<MirrorPolicy> {
        self.augment_mirrored.then_some(self.mirror_policy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub iterations: usize,
    pub label_scale: LabelScale,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 500,
            label_scale: LabelScale::default(),
        }
    }
}

/// How long the robot sessions run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub collect_duration_ms: u64,
    pub drive_duration_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collect_duration_ms: 30_000,
            drive_duration_ms: 30_000,
        }
    }
}

/// Simulated robot and synthetic camera used by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub camera_width: u32,
    pub camera_height: u32,
    /// Lane centre per frame, 0.0 left edge to 1.0 right edge
    pub lane_positions: Vec<f32>,
    /// Steering wheel readings replayed while collecting
    pub sensor_angles: Vec<f32>,
    pub rack_span: i32,
    pub ticks_per_poll: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            camera_width: 270,
            camera_height: 360,
            lane_positions: vec![0.3, 0.4, 0.5, 0.6, 0.7],
            sensor_angles: vec![65.0, 57.5, 50.0, 42.5, 35.0],
            rack_span: 200,
            ticks_per_poll: 10,
        }
    }
}

impl SimulationConfig {
    pub fn robot(&self) -> SimulatedRobot {
        SimulatedRobot::new(SimulatedConfig {
            rack_span: self.rack_span,
            ticks_per_poll: self.ticks_per_poll,
            sensor_angles: self.sensor_angles.clone(),
            ..Default::default()
        })
    }

    pub fn camera(&self) -> SyntheticCamera {
        SyntheticCamera::new(
            self.camera_width,
            self.camera_height,
            self.lane_positions.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
