//! Labeled samples and the design matrix built from them

use crate::RegressionError;
use feature_engine::{FeatureVector, GrayRow};
use serde::{Deserialize, Serialize};

/// One captured scan-line labeled with the steering angle (percent, 0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub pixels: GrayRow,
    pub label: f64,
}

impl TrainingSample {
    pub fn new(pixels: GrayRow, label: f64) -> Self {
        Self { pixels, label }
    }

    pub fn features(&self) -> FeatureVector {
        self.pixels.features()
    }
}

/// How stored percentage labels are presented to the regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelScale {
    /// Raw percentage, 0 (full right) to 100 (full left)
    Percent,
    /// `(percent - 50) / 50`, so straight ahead is 0 and the locks are -1 and 1
    #[default]
    Centered,
}

impl LabelScale {
    /// Stored percentage to regression target
    pub fn normalize(&self, percent: f64) -> f64 {
        match self {
            LabelScale::Percent => percent,
            LabelScale::Centered => (percent - 50.0) / 50.0,
        }
    }

    /// Regression output back to a percentage
    pub fn denormalize(&self, value: f64) -> f64 {
        match self {
            LabelScale::Percent => value,
            LabelScale::Centered => value * 50.0 + 50.0,
        }
    }
}

/// Validated design matrix `x` (bias column included) and targets `y`
#[derive(Debug, Clone)]
pub struct TrainingSet {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

impl TrainingSet {
    /// Check that there is at least one sample, one label per sample and that
    /// every row has the same length
    pub fn new(x: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Self, RegressionError> {
        if x.len() != y.len() {
            return Err(RegressionError::DimensionMismatch {
                context: "samples vs labels",
                expected: x.len(),
                actual: y.len(),
            });
        }
        let width = x.first().map(Vec::len).ok_or(RegressionError::EmptyDataSet)?;
        if let Some(row) = x.iter().find(|row| row.len() != width) {
            return Err(RegressionError::DimensionMismatch {
                context: "feature row length",
                expected: width,
                actual: row.len(),
            });
        }
        Ok(Self { x, y })
    }

    /// Build from stored samples, applying the label convention
    pub fn from_samples(samples: &[TrainingSample], scale: LabelScale) -> Result<Self, RegressionError> {
        let x = samples.iter().map(|s| s.features().into_values()).collect();
        let y = samples.iter().map(|s| scale.normalize(s.label)).collect();
        Self::new(x, y)
    }

    pub fn x(&self) -> &[Vec<f64>] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Row length, bias included
    pub fn feature_count(&self) -> usize {
        self.x[0].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_scales() {
        assert_eq!(LabelScale::Centered.normalize(0.0), -1.0);
        assert_eq!(LabelScale::Centered.normalize(100.0), 1.0);
        assert_eq!(LabelScale::Centered.normalize(50.0), 0.0);
        assert_eq!(LabelScale::Centered.denormalize(0.5), 75.0);
        assert_eq!(LabelScale::Percent.normalize(42.0), 42.0);
    }

    #[test]
    fn test_from_samples() {
        let samples = vec![
            TrainingSample::new(GrayRow(vec![0, 255]), 25.0),
            TrainingSample::new(GrayRow(vec![255, 0]), 75.0),
        ];
        let set = TrainingSet::from_samples(&samples, LabelScale::Centered).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.feature_count(), 3);
        assert_eq!(set.x()[0], vec![1.0, 0.0, 1.0]);
        assert_eq!(set.y(), &[-0.5, 0.5]);
    }

    #[test]
    fn test_rejects_uneven_rows() {
        let result = TrainingSet::new(vec![vec![1.0, 0.0], vec![1.0]], vec![0.0, 1.0]);
        assert!(matches!(
            result,
            Err(RegressionError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_label_count_mismatch() {
        let result = TrainingSet::new(vec![vec![1.0]], vec![0.0, 1.0]);
        assert!(matches!(result, Err(RegressionError::DimensionMismatch { .. })));
        assert!(matches!(
            TrainingSet::new(vec![], vec![]),
            Err(RegressionError::EmptyDataSet)
        ));
    }
}
