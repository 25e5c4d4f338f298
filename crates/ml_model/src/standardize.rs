//! Per-feature standardization with train-split-only statistics.

use serde::{Deserialize, Serialize};

/// Column index of the constant bias term, which is exempt from scaling.
const BIAS_COLUMN: usize = 0;

/// Per-column mean/std scaling fitted on the training split.
///
/// The statistics are stored in the model artifact and reused verbatim at
/// inference time; the validation split never contributes to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Standardizer {
    /// Fits means and standard deviations over the given feature rows.
    ///
    /// The bias column keeps mean 0 / std 1 so it passes through unchanged.
    /// A zero or non-finite standard deviation is clamped to 1.
    #[must_use]
    pub fn fit(feature_rows: &[&[f64]]) -> Self {
        let arity = feature_rows.first().map_or(0, |row| row.len());
        let count = feature_rows.len() as f64;

        let mut means = vec![0.0; arity];
        let mut stds = vec![1.0; arity];

        for column in 0..arity {
            if column == BIAS_COLUMN {
                continue;
            }

            let mean = feature_rows.iter().map(|row| row[column]).sum::<f64>() / count;
            let variance = feature_rows
                .iter()
                .map(|row| {
                    let diff = row[column] - mean;
                    diff * diff
                })
                .sum::<f64>()
                / count;
            let std = variance.sqrt();

            means[column] = mean;
            stds[column] = if std.is_finite() && std > 0.0 { std } else { 1.0 };
        }

        Self { means, stds }
    }

    /// Reconstructs a standardizer from artifact statistics.
    #[must_use]
    pub const fn from_stats(means: Vec<f64>, stds: Vec<f64>) -> Self {
        Self { means, stds }
    }

    /// Applies `(x - mean) / std` per column.
    #[must_use]
    pub fn apply(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(value, (mean, std))| (value - mean) / std)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(rows: &[Vec<f64>], index: usize) -> Vec<f64> {
        rows.iter().map(|r| r[index]).collect()
    }

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_std() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![1.0, f64::from(i), f64::from(i % 7) * 3.0])
            .collect();
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();

        let standardizer = Standardizer::fit(&refs);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| standardizer.apply(r)).collect();

        for index in 1..3 {
            let values = column(&scaled, index);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let std = (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
                / values.len() as f64)
                .sqrt();
            assert!(mean.abs() < 1e-9, "column {index} mean {mean}");
            assert!((std - 1.0).abs() < 1e-9, "column {index} std {std}");
        }
    }

    #[test]
    fn test_bias_column_passes_through() {
        let rows = [vec![1.0, 5.0], vec![1.0, 9.0], vec![1.0, 13.0]];
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();

        let standardizer = Standardizer::fit(&refs);
        for row in &rows {
            assert!((standardizer.apply(row)[0] - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_constant_column_std_clamped_to_one() {
        let rows = [vec![1.0, 7.0], vec![1.0, 7.0], vec![1.0, 7.0]];
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();

        let standardizer = Standardizer::fit(&refs);
        assert!((standardizer.stds[1] - 1.0).abs() < f64::EPSILON);
        // Constant columns scale to exactly zero instead of dividing by zero.
        assert!((standardizer.apply(&rows[0])[1] - 0.0).abs() < f64::EPSILON);
    }
}
