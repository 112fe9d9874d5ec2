//! Autonomous driving session

use crate::config::AutopilotConfig;
use crate::robot::{prepare_robot, release_robot};
use anyhow::{bail, Context, Result};
use camera_capture::FrameSource;
use feature_engine::FeatureExtractor;
use regression_engine::SteeringPredictor;
use robot_protocol::MotorSensorDriver;
use std::future::Future;
use std::time::Duration;
use steering::{AngleSource, SteeringController, SteeringError};
use storage::ModelStore;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Steering angles predicted from live camera frames
pub struct ModelAngleSource<C> {
    camera: C,
    extractor: FeatureExtractor,
    predictor: SteeringPredictor,
    skipped: u64,
}

impl<C: FrameSource> ModelAngleSource<C> {
    pub fn new(camera: C, extractor: FeatureExtractor, predictor: SteeringPredictor) -> Self {
        Self {
            camera,
            extractor,
            predictor,
            skipped: 0,
        }
    }

    /// Frames that produced no angle so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Check one frame against the model before anything moves
    ///
    /// Fails when the camera region yields a feature count the model was not
    /// trained on.
    pub fn check_frame(&mut self) -> Result<()> {
        let frame = self
            .camera
            .capture()
            .context("Failed to capture a frame for the model check")?;
        let row = self.extractor.extract(&frame)?;
        let features = row.pixels.len() + 1;
        if features != self.predictor.feature_count() {
            bail!(
                "Model expects {} features but the camera region yields {}",
                self.predictor.feature_count(),
                features
            );
        }
        Ok(())
    }

    fn predict_frame(&mut self) -> Result<f32> {
        let frame = self.camera.capture()?;
        let row = self.extractor.extract(&frame)?;
        let percent = self.predictor.predict(&row.features())?;
        Ok(percent as f32)
    }
}

impl<C: FrameSource> AngleSource for ModelAngleSource<C> {
    fn next_angle(&mut self) -> Result<Option<f32>, SteeringError> {
        match self.predict_frame() {
            Ok(angle) => Ok(Some(angle)),
            Err(e) => {
                self.skipped += 1;
                warn!("No steering angle for this frame: {:#}", e);
                Ok(None)
            }
        }
    }
}

/// Counters of one driving session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// Predicted angles applied to the rack
    pub steered: usize,
}

/// Drive with the model saved as `name` until the configured duration has
/// passed or `shutdown` resolves
pub async fn run_drive<D, C, F>(
    config: &AutopilotConfig,
    name: &str,
    controller: SteeringController<D>,
    camera: C,
    shutdown: F,
) -> Result<DriveSummary>
where
    D: MotorSensorDriver + 'static,
    C: FrameSource + 'static,
    F: Future<Output = ()>,
{
    let model = ModelStore::new(&config.data_dir)
        .load(name)
        .with_context(|| format!("Failed to load model {}", name))?;
    let extractor = FeatureExtractor::from_source_region(
        config.view.geometry(),
        &model.calibration.source_region,
    );
    let mut source = ModelAngleSource::new(camera, extractor, model.predictor());
    source
        .check_frame()
        .with_context(|| format!("Model {} does not fit the camera", name))?;

    let mut controller = prepare_robot(controller).await?;
    let (tx, mut rx) = mpsc::channel(config.steering.channel_capacity.max(1));
    if let Err(e) = controller.drive_with_model(source, tx) {
        release_robot(controller).await?;
        return Err(e).context("Failed to start driving");
    }
    info!("Driving with model {}", name);

    let deadline = tokio::time::sleep(Duration::from_millis(config.session.drive_duration_ms));
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    let mut summary = DriveSummary::default();
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut shutdown => {
                info!("Driving interrupted");
                break;
            }
            angle = rx.recv() => match angle {
                Some(_) => summary.steered += 1,
                None => break,
            },
        }
    }

    release_robot(controller).await?;
    info!("Drive finished after {} steering updates", summary.steered);
    Ok(summary)
}
