//! Training session

use crate::config::AutopilotConfig;
use anyhow::{Context, Result};
use regression_engine::{
    GradientDescentTrainer, IterationProgress, TrainingOutcome, TrainingSample, TrainingSet,
};
use std::future::Future;
use storage::{ModelCalibration, ModelStore, SteeringModel};
use tracing::info;

/// Result of a training session
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub samples: usize,
    pub outcome: TrainingOutcome,
    pub iterations_completed: usize,
    pub final_cost: f64,
}

/// Fit a model on the samples of `name` and save it
///
/// When `shutdown` resolves first the descent is cancelled and the theta
/// reached so far is saved.
pub async fn train_model<F>(config: &AutopilotConfig, name: &str, shutdown: F) -> Result<TrainSummary>
where
    F: Future<Output = ()>,
{
    let models = ModelStore::new(&config.data_dir);
    let records = models
        .sample_store(name)?
        .load_records()
        .with_context(|| format!("Failed to load samples of {}", name))?;
    let calibration = records
        .first()
        .map(ModelCalibration::from_record)
        .context("Sample file has no samples")?;

    let samples: Vec<TrainingSample> = records.into_iter().map(|r| r.sample).collect();
    let label_scale = config.training.label_scale;
    let set = TrainingSet::from_samples(&samples, label_scale)?;

    let mut trainer = GradientDescentTrainer::from_set(
        set,
        config.training.learning_rate,
        config.training.iterations,
    );
    trainer.generate_theta();
    let run = trainer.run()?;

    let mut last_logged = None;
    let delivery = run.deliver(
        move |progress: IterationProgress| {
            let percent = progress.percent_done();
            if percent % 10 == 0 && last_logged != Some(percent) {
                last_logged = Some(percent);
                info!(
                    "Training {}% (iteration {}/{}), cost {:.6}",
                    percent, progress.iteration, progress.total_iterations, progress.cost
                );
            }
        },
        |report| info!("Training finished: {:?}", report.outcome),
    );
    tokio::pin!(delivery);
    tokio::pin!(shutdown);

    let report = tokio::select! {
        report = &mut delivery => report?,
        _ = &mut shutdown => {
            trainer.cancel();
            delivery.await?
        }
    };

    let model = SteeringModel::new(report.theta.clone(), calibration, label_scale);
    models.save(name, &model)?;

    Ok(TrainSummary {
        samples: samples.len(),
        outcome: report.outcome,
        iterations_completed: report.iterations_completed,
        final_cost: report.final_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::{GrayRow, SourceRegion};
    use regression_engine::LabelScale;
    use storage::StorageError;

    fn config_in(dir: &tempfile::TempDir) -> AutopilotConfig {
        let mut config = AutopilotConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config
    }

    fn write_samples(config: &AutopilotConfig) {
        let store = ModelStore::new(&config.data_dir).sample_store("lap").unwrap();
        let region = SourceRegion {
            x: 10,
            y: 20,
            width: 30,
            height: 5,
        };
        for (pixels, label) in [
            (vec![255, 0, 0], 0.0),
            (vec![0, 255, 0], 50.0),
            (vec![0, 0, 255], 100.0),
        ] {
            store
                .append(&TrainingSample::new(GrayRow(pixels), label), &region)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_trains_and_saves_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.training.iterations = 200;
        config.training.learning_rate = 0.5;
        write_samples(&config);

        let summary = train_model(&config, "lap", std::future::pending()).await.unwrap();
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.outcome, TrainingOutcome::Completed);
        assert_eq!(summary.iterations_completed, 200);

        let model = ModelStore::new(dir.path()).load("lap").unwrap();
        assert_eq!(model.theta.len(), 4);
        assert_eq!(model.calibration.processed_width, 3);
        assert_eq!(model.calibration.source_region.width, 30);
        assert_eq!(model.label_scale, LabelScale::Centered);
    }

    #[tokio::test]
    async fn test_interrupted_training_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.training.iterations = 50_000_000;
        write_samples(&config);

        let summary = train_model(&config, "lap", std::future::ready(())).await.unwrap();
        assert_eq!(summary.outcome, TrainingOutcome::Cancelled);
        assert!(summary.iterations_completed < 50_000_000);

        let model = ModelStore::new(dir.path()).load("lap").unwrap();
        assert_eq!(model.theta.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_samples() {
        let dir = tempfile::tempdir().unwrap();
        let err = train_model(&config_in(&dir), "nothing", std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound(_))
        ));
    }
}
