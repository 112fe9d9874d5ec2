//! Linear Regression Engine
//!
//! Fits the steering model by batch gradient descent on a background task and
//! maps live feature vectors back to steering percentages.

mod dataset;
mod predictor;
mod tools;
mod trainer;

pub use dataset::{LabelScale, TrainingSample, TrainingSet};
pub use predictor::SteeringPredictor;
pub use tools::{compute_cost, compute_hypothesis};
pub use trainer::{
    descend, GradientDescentTrainer, IterationProgress, TrainerState, TrainingEvent,
    TrainingOutcome, TrainingReport, TrainingRun,
};

use thiserror::Error;

/// Errors during training or prediction
#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Training set is empty")]
    EmptyDataSet,
    #[error("Theta must be set or generated before training")]
    ThetaNotInitialized,
    #[error("Trainer already started")]
    AlreadyStarted,
    #[error("Training task failed: {0}")]
    TaskFailed(String),
}
