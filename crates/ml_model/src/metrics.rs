//! Fit-quality metrics.

use serde::{Deserialize, Serialize};

/// Regression fit metrics on one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// Computes MAE, RMSE and R² for a prediction set.
///
/// R² is defined as 0 when the truth has zero variance, matching the
/// convention used when a degenerate split would otherwise divide by zero.
#[must_use]
pub fn evaluate(truth: &[f64], predictions: &[f64]) -> RegressionMetrics {
    let count = truth.len().max(1) as f64;

    let mae = truth
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / count;

    let mse = truth
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / count;

    let mean = truth.iter().sum::<f64>() / count;
    let ss_res = truth
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>();
    let ss_tot = truth.iter().map(|t| (t - mean) * (t - mean)).sum::<f64>();

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    RegressionMetrics {
        mae,
        rmse: mse.sqrt(),
        r2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let truth = [1.0, 2.0, 3.0, 4.0];
        let metrics = evaluate(&truth, &truth);
        assert!(metrics.mae.abs() < f64::EPSILON);
        assert!(metrics.rmse.abs() < f64::EPSILON);
        assert!((metrics.r2 - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_errors() {
        let truth = [0.0, 0.0, 0.0, 0.0];
        let predictions = [1.0, -1.0, 1.0, -1.0];
        let metrics = evaluate(&truth, &predictions);
        assert!((metrics.mae - 1.0).abs() < f64::EPSILON);
        assert!((metrics.rmse - 1.0).abs() < f64::EPSILON);
        // Zero-variance truth pins R² at 0 rather than dividing by zero.
        assert!(metrics.r2.abs() < f64::EPSILON);
    }

    #[test]
    fn test_mean_prediction_scores_zero_r2() {
        let truth = [2.0, 4.0, 6.0, 8.0];
        let predictions = [5.0, 5.0, 5.0, 5.0];
        let metrics = evaluate(&truth, &predictions);
        assert!(metrics.r2.abs() < 1e-12);
    }
}
