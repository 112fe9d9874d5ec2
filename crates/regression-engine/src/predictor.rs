//! Steering prediction from a fitted theta

use crate::dataset::LabelScale;
use crate::tools::compute_hypothesis;
use crate::RegressionError;
use feature_engine::FeatureVector;
use tracing::debug;

/// Maps a live feature vector to a steering percentage
#[derive(Debug, Clone)]
pub struct SteeringPredictor {
    theta: Vec<f64>,
    label_scale: LabelScale,
}

impl SteeringPredictor {
    pub fn new(theta: Vec<f64>, label_scale: LabelScale) -> Self {
        Self { theta, label_scale }
    }

    /// Feature vector length this predictor accepts
    pub fn feature_count(&self) -> usize {
        self.theta.len()
    }

    /// Steering angle in percent, clamped to 0-100
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, RegressionError> {
        let h = compute_hypothesis(features.values(), &self.theta)?;
        let percent = self.label_scale.denormalize(h).clamp(0.0, 100.0);
        debug!("Predicted h={:.4} -> {:.1}%", h, percent);
        Ok(percent)
    }
}
