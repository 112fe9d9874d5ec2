//! Data collection session
//!
//! While a person steers with the wheel, every angle the robot applies
//! triggers a camera capture (unless one is still in flight). The scan-line
//! under the region of interest is stored with the angle as its label.

use crate::config::{AutopilotConfig, ExistingSamples};
use crate::robot::{prepare_robot, release_robot};
use anyhow::{anyhow, bail, Context, Result};
use camera_capture::{CaptureGuard, FrameSource};
use feature_engine::FeatureExtractor;
use regression_engine::TrainingSample;
use robot_protocol::MotorSensorDriver;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use steering::SteeringController;
use storage::{mirror, MirrorPolicy, ModelStore, TrainingSampleStore};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Counters of one collection session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectSummary {
    /// Angles reported by the steering loop
    pub steered: usize,
    /// Angles dropped because a capture was in flight
    pub skipped_busy: usize,
    /// Captures that produced samples
    pub captured: usize,
    /// Captures that failed and were skipped
    pub failed: usize,
    /// Lines appended to the sample file, mirrored copies included
    pub samples_written: usize,
}

/// Capture, extract and append; one run per accepted angle
struct SamplePipeline<C> {
    camera: Arc<Mutex<C>>,
    extractor: FeatureExtractor,
    store: TrainingSampleStore,
    mirror: Option<MirrorPolicy>,
}

impl<C> Clone for SamplePipeline<C> {
    fn clone(&self) -> Self {
        Self {
            camera: Arc::clone(&self.camera),
            extractor: self.extractor.clone(),
            store: self.store.clone(),
            mirror: self.mirror,
        }
    }
}

impl<C: FrameSource> SamplePipeline<C> {
    fn record(&self, angle: f32) -> Result<usize> {
        let frame = self
            .camera
            .lock()
            .map_err(|_| anyhow!("camera lock poisoned"))?
            .capture()?;
        let row = self.extractor.extract(&frame)?;

        let sample = TrainingSample::new(row.pixels, f64::from(angle));
        self.store.append(&sample, &row.region)?;
        let mut written = 1;

        if let Some(policy) = self.mirror {
            self.store.append(&mirror(&sample, policy), &row.region)?;
            written += 1;
        }
        debug!("Recorded frame {} at {:.1}%", frame.sequence, angle);
        Ok(written)
    }
}

/// Turns steered angles into stored training samples
pub struct DataCollector<C> {
    pipeline: SamplePipeline<C>,
    guard: CaptureGuard,
    tasks: JoinSet<Result<usize>>,
    paused: bool,
    summary: CollectSummary,
}

impl<C: FrameSource + 'static> DataCollector<C> {
    pub fn new(
        camera: C,
        extractor: FeatureExtractor,
        store: TrainingSampleStore,
        mirror: Option<MirrorPolicy>,
    ) -> Self {
        Self {
            pipeline: SamplePipeline {
                camera: Arc::new(Mutex::new(camera)),
                extractor,
                store,
                mirror,
            },
            guard: CaptureGuard::new(),
            tasks: JoinSet::new(),
            paused: false,
            summary: CollectSummary::default(),
        }
    }

    pub fn capture_guard(&self) -> &CaptureGuard {
        &self.guard
    }

    /// Ignore steered angles until `resume`
    pub fn pause(&mut self) {
        info!("Collection paused");
        self.paused = true;
    }

    pub fn resume(&mut self) {
        info!("Collection resumed");
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Handle one angle applied by the steering loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_steered(&mut self, angle: f32) {
        self.summary.steered += 1;
        if self.paused {
            return;
        }

        let Some(permit) = self.guard.try_acquire() else {
            self.summary.skipped_busy += 1;
            debug!("Capture in flight, skipping angle {:.1}", angle);
            return;
        };

        let pipeline = self.pipeline.clone();
        self.tasks.spawn_blocking(move || {
            let _permit = permit;
            pipeline.record(angle)
        });
    }

    /// Counters accounted so far
    pub fn summary(&self) -> CollectSummary {
        self.summary
    }

    /// Captures spawned but not yet accounted
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next capture to finish and account for it
    ///
    /// Stays pending while nothing is in flight. Cancel safe.
    pub async fn next_completed(&mut self) {
        match self.tasks.join_next().await {
            Some(joined) => self.settle(joined),
            None => std::future::pending().await,
        }
    }

    fn settle(&mut self, joined: Result<Result<usize>, JoinError>) {
        match joined {
            Ok(Ok(written)) => {
                self.summary.captured += 1;
                self.summary.samples_written += written;
            }
            Ok(Err(e)) => {
                self.summary.failed += 1;
                warn!("Skipping frame: {:#}", e);
            }
            Err(e) => {
                self.summary.failed += 1;
                warn!("Capture task failed: {}", e);
            }
        }
    }

    /// Wait for captures still in flight and return the counters
    pub async fn finish(mut self) -> CollectSummary {
        while let Some(joined) = self.tasks.join_next().await {
            self.settle(joined);
        }
        self.summary
    }
}

/// Run a collection session for `name` until the configured duration has
/// passed or `shutdown` resolves
pub async fn run_collect<D, C, F>(
    config: &AutopilotConfig,
    name: &str,
    controller: SteeringController<D>,
    camera: C,
    shutdown: F,
) -> Result<CollectSummary>
where
    D: MotorSensorDriver + 'static,
    C: FrameSource + 'static,
    F: Future<Output = ()>,
{
    let store = ModelStore::new(&config.data_dir).sample_store(name)?;
    if store.exists() {
        match config.collect.existing_samples {
            ExistingSamples::Refuse => bail!(
                "Sample file {} already exists; set collect.existing_samples to overwrite or append",
                store.path().display()
            ),
            ExistingSamples::Overwrite => {
                store.delete()?;
            }
            ExistingSamples::Append => info!("Appending to {}", store.path().display()),
        }
    }

    let extractor = FeatureExtractor::new(config.view.geometry(), &config.region.roi());
    let mut collector = DataCollector::new(camera, extractor, store, config.collect.mirror());

    let mut controller = prepare_robot(controller).await?;
    let (tx, mut rx) = mpsc::channel(config.steering.channel_capacity.max(1));
    if let Err(e) = controller.start_manual_steering(tx) {
        release_robot(controller).await?;
        return Err(e).context("Failed to start manual steering");
    }
    info!("Collecting samples for {}", name);

    let deadline = tokio::time::sleep(Duration::from_millis(config.session.collect_duration_ms));
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut shutdown => {
                info!("Collection interrupted");
                break;
            }
            angle = rx.recv() => match angle {
                Some(angle) => collector.on_steered(angle),
                None => break,
            },
            _ = collector.next_completed() => {}
        }
    }

    let released = release_robot(controller).await;
    let summary = collector.finish().await;
    info!(
        "Collected {} samples from {} captures ({} failed, {} skipped)",
        summary.samples_written, summary.captured, summary.failed, summary.skipped_busy
    );
    released?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{SyntheticCamera, ViewGeometry};
    use feature_engine::{GrayRow, SourceRegion};

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::from_source_region(
            ViewGeometry::new(100, 100),
            &SourceRegion {
                x: 0,
                y: 50,
                width: 100,
                height: 10,
            },
        )
    }

    fn collector(camera: SyntheticCamera, dir: &tempfile::TempDir) -> DataCollector<SyntheticCamera> {
        let store = TrainingSampleStore::new(dir.path().join("lap_data.csv"));
        DataCollector::new(camera, extractor(), store, Some(MirrorPolicy::Reflect))
    }

    #[tokio::test]
    async fn test_steered_angle_is_stored_with_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(SyntheticCamera::new(10, 10, vec![0.0]), &dir);

        collector.on_steered(30.0);
        let summary = collector.finish().await;
        assert_eq!(summary.captured, 1);
        assert_eq!(summary.samples_written, 2);

        let records = TrainingSampleStore::new(dir.path().join("lap_data.csv"))
            .load_records()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sample.label, 30.0);
        assert_eq!(records[1].sample.label, 70.0);
        assert_eq!(records[1].sample.pixels, records[0].sample.pixels.mirrored());
        assert_eq!(records[0].region.y, 50);

        // Lane on the left edge: dark pixels come first
        let GrayRow(pixels) = &records[0].sample.pixels;
        assert!(pixels[0] < pixels[9]);
    }

    #[tokio::test]
    async fn test_busy_capture_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(SyntheticCamera::new(10, 10, vec![0.5]), &dir);

        let held = collector.capture_guard().try_acquire().unwrap();
        collector.on_steered(50.0);
        drop(held);

        let summary = collector.finish().await;
        assert_eq!(summary.steered, 1);
        assert_eq!(summary.skipped_busy, 1);
        assert_eq!(summary.captured, 0);
    }

    #[tokio::test]
    async fn test_paused_collector_ignores_angles() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(SyntheticCamera::new(10, 10, vec![0.5]), &dir);

        collector.pause();
        collector.on_steered(50.0);
        assert!(collector.is_paused());
        collector.resume();
        collector.on_steered(60.0);

        let summary = collector.finish().await;
        assert_eq!(summary.steered, 2);
        assert_eq!(summary.captured, 1);
    }

    #[tokio::test]
    async fn test_failure_counted_as_it_happens() {
        let dir = tempfile::tempdir().unwrap();
        let camera = SyntheticCamera::new(10, 10, vec![0.5]).failing_every(2);
        let mut collector = collector(camera, &dir);

        collector.on_steered(40.0);
        collector.next_completed().await;
        assert_eq!(collector.summary().captured, 1);
        assert_eq!(collector.in_flight(), 0);

        collector.on_steered(45.0);
        collector.next_completed().await;
        assert_eq!(collector.summary().failed, 1);
        assert_eq!(collector.in_flight(), 0);

        let summary = collector.finish().await;
        assert_eq!(summary.captured, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.samples_written, 2);
    }

    #[tokio::test]
    async fn test_failed_capture_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let camera = SyntheticCamera::new(10, 10, vec![0.5]).failing_every(1);
        let mut collector = collector(camera, &dir);

        collector.on_steered(40.0);
        let summary = collector.finish().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.samples_written, 0);
        assert!(!dir.path().join("lap_data.csv").exists());
    }
}
