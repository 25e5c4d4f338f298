//! Inference over each vehicle's latest feature row.

use tracing::warn;
use uuid::Uuid;

use crate::boosted::BoostedModel;
use crate::standardize::Standardizer;
use crate::transform::TargetTransform;
use crate::{EngineParams, ModelArtifact};

/// Applies a trained artifact to the latest feature row of each vehicle.
///
/// Each row is standardized with the artifact's stored statistics, run
/// through the artifact's engine, inverted back to kilometers, clamped to
/// `[0, cap]` and rounded to two decimals. Vehicles whose feature arity does
/// not match the artifact schema are skipped, not zero-filled.
#[must_use]
pub fn predict_latest(
    artifact: &ModelArtifact,
    latest_by_vehicle: &[(Uuid, Vec<f64>)],
) -> Vec<(Uuid, f64)> {
    let standardizer = Standardizer::from_stats(
        artifact.feature_means.clone(),
        artifact.feature_stds.clone(),
    );
    let transform = TargetTransform::new(artifact.target_transform, artifact.target_cap);

    let booster = match &artifact.params {
        EngineParams::Booster(value) => match BoostedModel::from_value(value) {
            Ok(model) => Some(model),
            Err(error) => {
                warn!(%error, "model artifact carries an unreadable booster");
                return Vec::new();
            }
        },
        EngineParams::Weights(_) => None,
    };

    let mut predictions = Vec::with_capacity(latest_by_vehicle.len());
    for (vehicle_id, features) in latest_by_vehicle {
        if features.len() != artifact.feature_names.len() {
            warn!(
                %vehicle_id,
                arity = features.len(),
                expected = artifact.feature_names.len(),
                "skipping vehicle with mismatched feature arity"
            );
            continue;
        }

        let standardized = standardizer.apply(features);
        let transformed = match (&artifact.params, &booster) {
            (EngineParams::Weights(weights), _) => standardized
                .iter()
                .zip(weights)
                .map(|(x, w)| x * w)
                .sum::<f64>(),
            (EngineParams::Booster(_), Some(model)) => model.predict_row(&standardized),
            (EngineParams::Booster(_), None) => continue,
        };

        let km = transform.invert(transformed);
        if !km.is_finite() {
            warn!(%vehicle_id, "skipping vehicle with non-finite prediction");
            continue;
        }

        predictions.push((*vehicle_id, (km * 100.0).round() / 100.0));
    }

    predictions
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{EngineKind, FitReport, RegressionMetrics, TransformKind};

    fn linear_artifact(weights: Vec<f64>, transform: TransformKind) -> ModelArtifact {
        let arity = weights.len();
        ModelArtifact {
            feature_names: (0..arity).map(|i| format!("f{i}")).collect(),
            engine: EngineKind::Linear,
            params: EngineParams::Weights(weights),
            feature_means: vec![0.0; arity],
            feature_stds: vec![1.0; arity],
            target_transform: transform,
            target_cap: 500.0,
            metrics: FitReport {
                train: RegressionMetrics {
                    mae: 0.0,
                    rmse: 0.0,
                    r2: 1.0,
                },
                validation: RegressionMetrics {
                    mae: 0.0,
                    rmse: 0.0,
                    r2: 1.0,
                },
            },
            row_count: 10,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_linear_prediction_is_the_dot_product() {
        let artifact = linear_artifact(vec![10.0, 2.0], TransformKind::None);
        let vehicle = Uuid::new_v4();
        let latest = vec![(vehicle, vec![1.0, 3.0])];

        let predictions = predict_latest(&artifact, &latest);
        assert_eq!(predictions, vec![(vehicle, 16.0)]);
    }

    #[test]
    fn test_negative_predictions_clamp_to_zero() {
        let artifact = linear_artifact(vec![-50.0, 0.0], TransformKind::None);
        let latest = vec![(Uuid::new_v4(), vec![1.0, 1.0])];

        let predictions = predict_latest(&artifact, &latest);
        assert_eq!(predictions[0].1, 0.0);
    }

    #[test]
    fn test_standardization_uses_artifact_statistics() {
        let mut artifact = linear_artifact(vec![0.0, 1.0], TransformKind::None);
        artifact.feature_means = vec![0.0, 100.0];
        artifact.feature_stds = vec![1.0, 10.0];
        let latest = vec![(Uuid::new_v4(), vec![1.0, 120.0])];

        // (120 - 100) / 10 = 2.0
        let predictions = predict_latest(&artifact, &latest);
        assert_eq!(predictions[0].1, 2.0);
    }

    #[test]
    fn test_arity_mismatch_is_omitted() {
        let artifact = linear_artifact(vec![1.0, 1.0], TransformKind::None);
        let ok = Uuid::new_v4();
        let latest = vec![
            (Uuid::new_v4(), vec![1.0]),
            (ok, vec![1.0, 1.0]),
            (Uuid::new_v4(), vec![1.0, 1.0, 1.0]),
        ];

        let predictions = predict_latest(&artifact, &latest);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].0, ok);
    }

    #[test]
    fn test_log1p_predictions_round_to_two_decimals() {
        let artifact = linear_artifact(vec![3.0, 0.0], TransformKind::Log1p);
        let latest = vec![(Uuid::new_v4(), vec![1.0, 0.0])];

        let predictions = predict_latest(&artifact, &latest);
        // expm1(3.0) = 19.0855... -> 19.09
        assert_eq!(predictions[0].1, 19.09);
    }
}
