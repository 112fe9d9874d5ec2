//! Hypothesis and cost for linear regression

use crate::RegressionError;

/// `theta · x`
pub fn compute_hypothesis(x: &[f64], theta: &[f64]) -> Result<f64, RegressionError> {
    if x.len() != theta.len() {
        return Err(RegressionError::DimensionMismatch {
            context: "hypothesis features vs theta",
            expected: theta.len(),
            actual: x.len(),
        });
    }
    Ok(dot(x, theta))
}

/// Mean squared error cost `(1/2m) * sum((h(x_i) - y_i)^2)`
pub fn compute_cost(x: &[Vec<f64>], y: &[f64], theta: &[f64]) -> Result<f64, RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::DimensionMismatch {
            context: "samples vs labels",
            expected: x.len(),
            actual: y.len(),
        });
    }
    if x.is_empty() {
        return Err(RegressionError::EmptyDataSet);
    }

    let m = y.len() as f64;
    let mut sum = 0.0;
    for (row, label) in x.iter().zip(y) {
        let error = compute_hypothesis(row, theta)? - label;
        sum += error * error;
    }
    Ok(sum / (2.0 * m))
}

/// Unchecked dot product for pre-validated inputs
pub(crate) fn dot(x: &[f64], theta: &[f64]) -> f64 {
    x.iter().zip(theta).map(|(a, b)| a * b).sum()
}
