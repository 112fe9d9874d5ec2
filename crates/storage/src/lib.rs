//! Storage Layer
//!
//! One directory holds every named run: `<name>_data.csv` with the labeled
//! scan-lines and `<name>_model.json` with the fitted model.

mod model;
mod samples;

pub use model::{ModelCalibration, ModelStore, SteeringModel};
pub use samples::{mirror, MirrorPolicy, SampleRecord, TrainingSampleStore};

use thiserror::Error;

/// File name suffix of training sample files
pub const DATA_FILE_SUFFIX: &str = "_data.csv";
/// File name suffix of model files
pub const MODEL_FILE_SUFFIX: &str = "_model.json";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Schema mismatch on line {line}: expected {expected} pixels, got {actual}")]
    SchemaMismatch {
        line: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid model name: {0:?}")]
    InvalidName(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Reject names that would escape the model directory
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
