//! Fitted model documents

use crate::samples::{SampleRecord, TrainingSampleStore};
use crate::{validate_name, StorageError, DATA_FILE_SUFFIX, MODEL_FILE_SUFFIX};
use feature_engine::SourceRegion;
use regression_engine::{LabelScale, SteeringPredictor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Geometry needed to repeat feature extraction at drive time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCalibration {
    pub source_region: SourceRegion,
    pub processed_width: u32,
    pub processed_height: u32,
}

impl ModelCalibration {
    /// Calibration of the run a record belongs to
    pub fn from_record(record: &SampleRecord) -> Self {
        Self {
            source_region: record.region,
            processed_width: record.sample.pixels.len() as u32,
            processed_height: 1,
        }
    }
}

/// Fitted theta plus its calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteeringModel {
    pub theta: Vec<f64>,
    #[serde(flatten)]
    pub calibration: ModelCalibration,
    #[serde(default)]
    pub label_scale: LabelScale,
}

impl SteeringModel {
    pub fn new(theta: Vec<f64>, calibration: ModelCalibration, label_scale: LabelScale) -> Self {
        Self {
            theta,
            calibration,
            label_scale,
        }
    }

    pub fn predictor(&self) -> SteeringPredictor {
        SteeringPredictor::new(self.theta.clone(), self.label_scale)
    }
}

/// Directory of named runs
#[derive(Debug, Clone)]
pub struct ModelStore {
    base_dir: PathBuf,
}

impl ModelStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn model_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.base_dir.join(format!("{}{}", name, MODEL_FILE_SUFFIX)))
    }

    /// Sample file belonging to the same run
    pub fn sample_store(&self, name: &str) -> Result<TrainingSampleStore, StorageError> {
        validate_name(name)?;
        Ok(TrainingSampleStore::new(
            self.base_dir.join(format!("{}{}", name, DATA_FILE_SUFFIX)),
        ))
    }

    /// Write the model, replacing any previous model of the same name
    pub fn save(&self, name: &str, model: &SteeringModel) -> Result<(), StorageError> {
        let path = self.model_path(name)?;
        if let Some(bad) = model.theta.iter().find(|t| !t.is_finite()) {
            return Err(StorageError::Serialization(format!(
                "theta contains non-finite value {}",
                bad
            )));
        }

        let json = serde_json::to_string_pretty(model)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::create_dir_all(&self.base_dir)?;
        fs::write(&path, json)?;

        info!(
            "Saved model {} ({} weights) to {}",
            name,
            model.theta.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<SteeringModel, StorageError> {
        let path = self.model_path(name)?;
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => e.into(),
        })?;

        let model: SteeringModel = serde_json::from_str(&content)
            .map_err(|e| StorageError::Parse(format!("{}: {}", path.display(), e)))?;
        if model.theta.is_empty() {
            return Err(StorageError::Parse(format!("{}: empty theta", path.display())));
        }
        let expected = model.calibration.processed_width as usize + 1;
        if model.theta.len() != expected {
            return Err(StorageError::Parse(format!(
                "{}: {} weights for a processed width of {} (expected {})",
                path.display(),
                model.theta.len(),
                model.calibration.processed_width,
                expected
            )));
        }

        debug!("Loaded model {} with {} weights", name, model.theta.len());
        Ok(model)
    }

    pub fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.model_path(name)?.is_file())
    }

    /// Remove the model file; returns whether there was one
    pub fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.model_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted model {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
