//! ML model crate for remaining-distance-until-maintenance prediction.
//!
//! This crate trains a regression model on the labeled dataset produced by
//! `dataset_builder` and applies trained artifacts to each vehicle's latest
//! feature row. The mandatory engine is a linear model trained with the Burn
//! framework; a gradient-boosted-tree engine (cargo feature `boosted`) is
//! tried first when enabled and silently falls back to the linear result on
//! any failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod boosted;
mod dataset;
mod engine;
mod metrics;
mod predict;
mod standardize;
mod training;
mod transform;

pub use engine::{DesignMatrix, EngineError, LinearEngine, RegressionEngine};
pub use metrics::{evaluate, RegressionMetrics};
pub use predict::predict_latest;
pub use standardize::Standardizer;
pub use training::{train, train_with_engine, MIN_TRAINING_ROWS};
pub use transform::{TargetTransform, TransformKind};

/// Which regression engine produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Linear,
    Boosted,
}

impl EngineKind {
    /// Stable string form used in persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Boosted => "boosted",
        }
    }
}

/// Fitted engine parameters: flat weights for the linear engine, a
/// serialized booster for the tree engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineParams {
    Weights(Vec<f64>),
    Booster(serde_json::Value),
}

/// Fit quality on the train and held-out validation splits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FitReport {
    pub train: RegressionMetrics,
    pub validation: RegressionMetrics,
}

/// An immutable trained model artifact.
///
/// Everything inference needs travels with the artifact: the feature schema,
/// the engine parameters, the standardization statistics derived from the
/// training split, and the target transform to invert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub engine: EngineKind,
    pub params: EngineParams,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub target_transform: TransformKind,
    pub target_cap: f64,
    pub metrics: FitReport,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Configuration for a training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Learning rate for the linear engine's optimizer.
    pub learning_rate: f64,
    /// Number of training epochs for the linear engine.
    pub epochs: usize,
    /// Batch size for the linear engine.
    pub batch_size: usize,
    /// L2 penalty applied to the linear weights.
    pub weight_decay: f64,
    /// Seed for the split shuffle and all engine-internal subsampling.
    pub seed: u64,
    /// Fraction of rows held out for validation.
    pub validation_ratio: f64,
    /// Raw labels are capped here before the transform.
    pub target_cap: f64,
    /// Target transform applied before fitting.
    pub transform: TransformKind,
    /// Whether to attempt the boosted engine when it is compiled in.
    pub use_boosted: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            epochs: 200,
            batch_size: 32,
            weight_decay: 1e-4,
            seed: 42,
            validation_ratio: 0.2,
            target_cap: 500.0,
            transform: TransformKind::Log1p,
            use_boosted: true,
        }
    }
}

/// Errors surfaced by training.
///
/// Optional-engine failures are absorbed inside the trainer and never appear
/// here; `Engine` covers only an internal invariant breach in the mandatory
/// linear fit.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("insufficient training data: {rows} rows, at least {required} required")]
    InsufficientData { rows: usize, required: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
