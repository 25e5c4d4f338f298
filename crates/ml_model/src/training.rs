//! Training orchestration for the maintenance model.
//!
//! Splits the labeled rows, standardizes features with train-only
//! statistics, transforms the target, fits the mandatory linear engine and
//! optionally the boosted engine, then assembles the immutable artifact.

use chrono::Utc;
use dataset_builder::{TrainingRow, FEATURE_NAMES};
use tracing::{info, warn};

use crate::engine::{DesignMatrix, LinearEngine, RegressionEngine};
use crate::standardize::Standardizer;
use crate::transform::TargetTransform;
use crate::{evaluate, FitReport, ModelArtifact, TrainError, TrainingConfig};

/// Minimum labeled rows required to train at all.
pub const MIN_TRAINING_ROWS: usize = 10;

/// Trains a model on the labeled rows with the default engine selection:
/// the boosted engine when compiled in and enabled, the linear engine
/// otherwise or on any boosted failure.
///
/// # Errors
///
/// Returns [`TrainError::InsufficientData`] when fewer than
/// [`MIN_TRAINING_ROWS`] rows are available. Optional-engine failures are
/// absorbed and never surface here.
pub fn train(rows: &[TrainingRow], config: &TrainingConfig) -> Result<ModelArtifact, TrainError> {
    train_with_engine(rows, config, default_boosted_engine(config))
}

/// Builds the default optional engine, honoring the cargo feature gate and
/// the runtime switch.
fn default_boosted_engine(config: &TrainingConfig) -> Option<Box<dyn RegressionEngine>> {
    #[cfg(feature = "boosted")]
    {
        if config.use_boosted {
            let boosted_config = crate::boosted::BoostedConfig {
                seed: config.seed,
                ..crate::boosted::BoostedConfig::default()
            };
            return Some(Box::new(crate::boosted::BoostedTreeEngine::new(
                boosted_config,
            )));
        }
    }
    #[cfg(not(feature = "boosted"))]
    let _ = config;

    None
}

/// Trains with an explicit optional engine, primarily for tests that force
/// the optional engine to fail.
///
/// # Errors
///
/// Returns [`TrainError::InsufficientData`] when fewer than
/// [`MIN_TRAINING_ROWS`] rows are available.
pub fn train_with_engine(
    rows: &[TrainingRow],
    config: &TrainingConfig,
    optional_engine: Option<Box<dyn RegressionEngine>>,
) -> Result<ModelArtifact, TrainError> {
    if rows.len() < MIN_TRAINING_ROWS {
        return Err(TrainError::InsufficientData {
            rows: rows.len(),
            required: MIN_TRAINING_ROWS,
        });
    }

    // Seeded shuffle, then an 80/20 split with at least one validation row.
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    shuffle_indices(&mut indices, config.seed);

    let validation_len = ((rows.len() as f64) * config.validation_ratio).round() as usize;
    let validation_len = validation_len.clamp(1, rows.len() - 1);
    let (validation_idx, train_idx) = indices.split_at(validation_len);

    // Scaling statistics come from the training split only; the validation
    // split never leaks into them.
    let train_features: Vec<&[f64]> = train_idx
        .iter()
        .map(|&i| rows[i].features.as_slice())
        .collect();
    let standardizer = Standardizer::fit(&train_features);
    let transform = TargetTransform::new(config.transform, config.target_cap);

    let build_matrix = |idx: &[usize]| DesignMatrix {
        features: idx
            .iter()
            .map(|&i| standardizer.apply(&rows[i].features))
            .collect(),
        targets: idx
            .iter()
            .map(|&i| transform.forward(rows[i].label_km))
            .collect(),
    };
    let train_split = build_matrix(train_idx);
    let validation_split = build_matrix(validation_idx);

    // The linear engine is mandatory and must succeed with >= 10 rows.
    let mut linear = LinearEngine::from_config(config);
    linear.fit(&train_split, &validation_split)?;
    let mut engine: Box<dyn RegressionEngine> = Box::new(linear);

    // The optional engine replaces the linear result only on success; any
    // failure falls back silently.
    if let Some(mut optional) = optional_engine {
        match optional.fit(&train_split, &validation_split) {
            Ok(()) => engine = optional,
            Err(error) => {
                warn!(%error, "optional engine failed; falling back to linear");
            }
        }
    }

    // Predictions are clamped to the transformed train-label range before
    // inversion so extrapolated values cannot blow up through expm1.
    let (transformed_lo, transformed_hi) = train_split.targets.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), &t| (lo.min(t), hi.max(t)),
    );
    let evaluate_split = |split: &DesignMatrix, idx: &[usize]| {
        let predictions: Vec<f64> = engine
            .predict(&split.features)
            .iter()
            .map(|t| transform.invert(t.clamp(transformed_lo, transformed_hi)))
            .collect();
        let truth: Vec<f64> = idx
            .iter()
            .map(|&i| rows[i].label_km.min(config.target_cap))
            .collect();
        evaluate(&truth, &predictions)
    };

    let metrics = FitReport {
        train: evaluate_split(&train_split, train_idx),
        validation: evaluate_split(&validation_split, validation_idx),
    };

    info!(
        engine = engine.kind().as_str(),
        rows = rows.len(),
        train_mae = metrics.train.mae,
        validation_mae = metrics.validation.mae,
        validation_r2 = metrics.validation.r2,
        "training complete"
    );

    Ok(ModelArtifact {
        feature_names: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
        engine: engine.kind(),
        params: engine.params(),
        feature_means: standardizer.means,
        feature_stds: standardizer.stds,
        target_transform: config.transform,
        target_cap: config.target_cap,
        metrics,
        row_count: rows.len(),
        created_at: Utc::now(),
    })
}

/// Shuffles indices using a simple LCG-based shuffle.
pub(crate) fn shuffle_indices(indices: &mut [usize], seed: u64) {
    // Simple Fisher-Yates shuffle with LCG random
    let mut rng_state = seed.wrapping_add(12345);

    for i in (1..indices.len()).rev() {
        // LCG: state = (a * state + c) mod m
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let j = ((rng_state >> 33) as usize) % (i + 1);
        indices.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::{EngineKind, EngineParams, TransformKind};

    /// Linear-ish synthetic fleet rows: label grows with recent usage.
    fn synthetic_rows(n: usize) -> Vec<TrainingRow> {
        (0..n)
            .map(|i| {
                let usage = (i % 10) as f64;
                let mut features = vec![0.0; FEATURE_NAMES.len()];
                features[0] = 1.0;
                features[1] = usage;
                features[7] = usage * 12.0;
                features[10] = (i % 5) as f64;
                TrainingRow {
                    features,
                    label_km: 20.0f64.mul_add(usage, 30.0),
                }
            })
            .collect()
    }

    /// An optional engine that always fails, for the fallback property.
    struct FailingEngine;

    impl RegressionEngine for FailingEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Boosted
        }

        fn fit(&mut self, _: &DesignMatrix, _: &DesignMatrix) -> Result<(), EngineError> {
            Err(EngineError::Fit("forced failure".to_string()))
        }

        fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
            vec![0.0; features.len()]
        }

        fn params(&self) -> EngineParams {
            EngineParams::Booster(serde_json::Value::Null)
        }
    }

    #[test]
    fn test_too_few_rows_is_insufficient_data() {
        let rows = synthetic_rows(MIN_TRAINING_ROWS - 1);
        let result = train(&rows, &TrainingConfig::default());
        assert!(matches!(
            result,
            Err(TrainError::InsufficientData { rows: 9, .. })
        ));
    }

    #[test]
    fn test_training_produces_a_complete_artifact() {
        let rows = synthetic_rows(60);
        let config = TrainingConfig {
            epochs: 60,
            ..TrainingConfig::default()
        };

        let artifact = train_with_engine(&rows, &config, None).expect("training should succeed");

        assert_eq!(artifact.engine, EngineKind::Linear);
        assert_eq!(artifact.feature_names.len(), FEATURE_NAMES.len());
        assert_eq!(artifact.feature_means.len(), FEATURE_NAMES.len());
        assert_eq!(artifact.feature_stds.len(), FEATURE_NAMES.len());
        assert_eq!(artifact.row_count, 60);
        assert_eq!(artifact.target_transform, TransformKind::Log1p);
        assert!(artifact.metrics.validation.rmse.is_finite());
        match artifact.params {
            EngineParams::Weights(ref w) => assert_eq!(w.len(), FEATURE_NAMES.len()),
            EngineParams::Booster(_) => panic!("expected linear weights"),
        }
    }

    #[test]
    fn test_failing_optional_engine_falls_back_to_linear() {
        let rows = synthetic_rows(40);
        let config = TrainingConfig {
            epochs: 40,
            ..TrainingConfig::default()
        };

        let artifact = train_with_engine(&rows, &config, Some(Box::new(FailingEngine)))
            .expect("fallback must never raise");

        assert_eq!(artifact.engine, EngineKind::Linear);
    }

    #[cfg(feature = "boosted")]
    #[test]
    fn test_default_training_uses_boosted_engine() {
        let rows = synthetic_rows(60);
        let config = TrainingConfig {
            epochs: 40,
            ..TrainingConfig::default()
        };

        let artifact = train(&rows, &config).expect("training should succeed");
        assert_eq!(artifact.engine, EngineKind::Boosted);
        assert!(matches!(artifact.params, EngineParams::Booster(_)));
    }

    #[test]
    fn test_split_is_deterministic_for_a_seed() {
        let mut first: Vec<usize> = (0..20).collect();
        let mut second: Vec<usize> = (0..20).collect();
        shuffle_indices(&mut first, 42);
        shuffle_indices(&mut second, 42);
        assert_eq!(first, second);

        let mut third: Vec<usize> = (0..20).collect();
        shuffle_indices(&mut third, 43);
        assert_ne!(first, third);
    }
}
