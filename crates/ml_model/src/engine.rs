//! Regression engine strategies.
//!
//! The trainer talks to engines through [`RegressionEngine`] so the optional
//! higher-capacity engine can be tried and dropped without its absence or
//! failure ever escaping the trainer. [`LinearEngine`] is the mandatory
//! baseline: a single no-bias linear layer trained with Adam on MSE plus a
//! small L2 penalty.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::data::dataset::Dataset;
use burn::nn::loss::{MseLoss, Reduction};
use burn::nn::{Linear, LinearConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use thiserror::Error;

use crate::dataset::{LabeledDataset, RowBatcher};
use crate::training::shuffle_indices;
use crate::{EngineKind, EngineParams, TrainingConfig};

/// Standardized features with transformed targets for one split.
#[derive(Debug, Clone, Default)]
pub struct DesignMatrix {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl DesignMatrix {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the matrix has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Errors raised by an engine during fitting.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("empty training matrix")]
    EmptyTrainingSet,

    #[error("engine fit failed: {0}")]
    Fit(String),
}

/// Strategy interface every regression engine implements.
///
/// Predictions are on the transformed target scale; the trainer owns the
/// inversion.
pub trait RegressionEngine {
    /// Which kind of engine this is.
    fn kind(&self) -> EngineKind;

    /// Fits the engine on the training split, using the validation split for
    /// early stopping.
    fn fit(&mut self, train: &DesignMatrix, validation: &DesignMatrix) -> Result<(), EngineError>;

    /// Predicts transformed targets for standardized feature rows.
    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64>;

    /// Serializable fitted parameters for the model artifact.
    fn params(&self) -> EngineParams;
}

/// Training requires the Autodiff wrapper for automatic differentiation.
type TrainBackend = Autodiff<NdArray>;

/// Stop after this many epochs without validation improvement.
const EARLY_STOPPING_PATIENCE: usize = 10;

/// The linear model: one dense layer, no intrinsic bias.
///
/// The dataset carries an explicit constant bias feature, so the layer
/// itself stays bias-free and its weights line up one-to-one with the
/// feature names.
#[derive(Module, Debug)]
struct LinearModel<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> LinearModel<B> {
    fn new(device: &B::Device, arity: usize) -> Self {
        let linear = LinearConfig::new(arity, 1).with_bias(false).init(device);
        Self { linear }
    }

    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(input)
    }
}

/// The mandatory gradient-descent linear engine.
pub struct LinearEngine {
    learning_rate: f64,
    epochs: usize,
    batch_size: usize,
    weight_decay: f64,
    seed: u64,
    weights: Vec<f64>,
}

impl LinearEngine {
    /// Creates an unfitted engine from the training configuration.
    #[must_use]
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            epochs: config.epochs,
            batch_size: config.batch_size.max(1),
            weight_decay: config.weight_decay,
            seed: config.seed,
            weights: Vec::new(),
        }
    }

    /// Fitted weights, index-aligned with the feature names.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl RegressionEngine for LinearEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Linear
    }

    fn fit(&mut self, train: &DesignMatrix, validation: &DesignMatrix) -> Result<(), EngineError> {
        let arity = train
            .features
            .first()
            .map(Vec::len)
            .ok_or(EngineError::EmptyTrainingSet)?;

        let device = NdArrayDevice::default();
        let mut model: LinearModel<TrainBackend> = LinearModel::new(&device, arity);
        let mut optimizer = AdamConfig::new().init();
        let loss_fn = MseLoss::new();

        let dataset = LabeledDataset::new(&train.features, &train.targets);
        let valid_dataset = if validation.is_empty() {
            None
        } else {
            Some(LabeledDataset::new(
                &validation.features,
                &validation.targets,
            ))
        };
        let batcher = RowBatcher::<TrainBackend>::new(device, arity);

        let num_samples = dataset.len();
        let mut final_train_loss = 0.0f32;
        let mut best_valid_loss = f32::MAX;
        let mut epochs_without_improvement = 0;

        for epoch in 0..self.epochs {
            let mut indices: Vec<usize> = (0..num_samples).collect();
            shuffle_indices(&mut indices, self.seed.wrapping_add(epoch as u64));

            let mut epoch_loss = 0.0f64;
            let mut batch_count = 0usize;

            for batch_start in (0..num_samples).step_by(self.batch_size) {
                let batch_end = (batch_start + self.batch_size).min(num_samples);
                let Some(batch_indices) = indices.get(batch_start..batch_end) else {
                    continue;
                };

                let items: Vec<_> = batch_indices
                    .iter()
                    .filter_map(|&i| dataset.get(i))
                    .collect();

                if items.is_empty() {
                    continue;
                }

                let batch = batcher.batch(items);

                let predictions = model.forward(batch.inputs);
                let mse = loss_fn.forward(predictions, batch.targets, Reduction::Mean);

                // L2 penalty keeps the fit stable on small fleets.
                let weight = model.linear.weight.val();
                let penalty = (weight.clone() * weight).sum().mul_scalar(self.weight_decay);
                let loss = mse + penalty;

                let loss_value: f32 = loss
                    .clone()
                    .into_data()
                    .to_vec()
                    .unwrap_or_else(|_| vec![0.0])
                    .first()
                    .copied()
                    .unwrap_or(0.0);

                epoch_loss += f64::from(loss_value);
                batch_count += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(self.learning_rate, model, grads);
            }

            final_train_loss = if batch_count > 0 {
                (epoch_loss / batch_count as f64) as f32
            } else {
                0.0
            };

            let mut valid_loss = None;
            if let Some(valid) = &valid_dataset {
                let loss = validation_loss(&model, valid, &batcher, &loss_fn);
                valid_loss = Some(loss);

                if loss < best_valid_loss {
                    best_valid_loss = loss;
                    epochs_without_improvement = 0;
                } else {
                    epochs_without_improvement += 1;
                    if epochs_without_improvement >= EARLY_STOPPING_PATIENCE {
                        log_progress(epoch + 1, final_train_loss, valid_loss);
                        println!(
                            "Early stopping triggered after {EARLY_STOPPING_PATIENCE} epochs without improvement"
                        );
                        break;
                    }
                }
            }

            if epoch % 10 == 0 || epoch == self.epochs - 1 {
                log_progress(epoch + 1, final_train_loss, valid_loss);
            }
        }

        let weights: Vec<f32> = model
            .linear
            .weight
            .val()
            .into_data()
            .to_vec()
            .map_err(|_| EngineError::Fit("failed to read trained weights".to_string()))?;
        self.weights = weights.into_iter().map(f64::from).collect();

        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features
            .iter()
            .map(|row| row.iter().zip(&self.weights).map(|(x, w)| x * w).sum())
            .collect()
    }

    fn params(&self) -> EngineParams {
        EngineParams::Weights(self.weights.clone())
    }
}

/// Computes the validation loss on a dataset.
fn validation_loss<B: Backend>(
    model: &LinearModel<B>,
    dataset: &LabeledDataset,
    batcher: &RowBatcher<B>,
    loss_fn: &MseLoss,
) -> f32 {
    let num_samples = dataset.len();
    if num_samples == 0 {
        return 0.0;
    }

    let mut total_loss = 0.0;
    let mut batch_count = 0;

    const BATCH_SIZE: usize = 64;
    for batch_start in (0..num_samples).step_by(BATCH_SIZE) {
        let batch_end = (batch_start + BATCH_SIZE).min(num_samples);

        let items: Vec<_> = (batch_start..batch_end)
            .filter_map(|i| dataset.get(i))
            .collect();

        if items.is_empty() {
            continue;
        }

        let batch = batcher.batch(items);
        let predictions = model.forward(batch.inputs);
        let loss = loss_fn.forward(predictions, batch.targets, Reduction::Mean);

        let loss_value: f32 = loss
            .into_data()
            .to_vec()
            .unwrap_or_else(|_| vec![0.0])
            .first()
            .copied()
            .unwrap_or(0.0);

        total_loss += f64::from(loss_value);
        batch_count += 1;
    }

    if batch_count > 0 {
        (total_loss / f64::from(batch_count)) as f32
    } else {
        0.0
    }
}

/// Logs training progress.
fn log_progress(epoch: usize, train_loss: f32, valid_loss: Option<f32>) {
    if let Some(vl) = valid_loss {
        println!("Epoch {epoch}: train_loss = {train_loss:.6}, valid_loss = {vl:.6}");
    } else {
        println!("Epoch {epoch}: train_loss = {train_loss:.6}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_matrix(n: usize) -> DesignMatrix {
        // Targets follow 1.5 + 0.8x exactly; the engine should recover the
        // relationship through the explicit bias feature.
        let features: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let x = (i as f64 / n as f64) * 2.0 - 1.0;
                vec![1.0, x]
            })
            .collect();
        let targets = features.iter().map(|row| 0.8f64.mul_add(row[1], 1.5)).collect();
        DesignMatrix { features, targets }
    }

    #[test]
    fn test_linear_engine_learns_linear_relationship() {
        let train = synthetic_matrix(64);
        let validation = synthetic_matrix(16);

        let config = TrainingConfig::default();
        let mut engine = LinearEngine::from_config(&config);
        engine.fit(&train, &validation).expect("fit should succeed");

        assert_eq!(engine.weights().len(), 2);

        let predictions = engine.predict(&train.features);
        let mae = train
            .targets
            .iter()
            .zip(&predictions)
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / train.targets.len() as f64;
        assert!(mae < 0.25, "linear engine failed to converge: mae {mae}");
    }

    #[test]
    fn test_empty_training_set_is_an_error() {
        let config = TrainingConfig::default();
        let mut engine = LinearEngine::from_config(&config);
        let empty = DesignMatrix::default();

        let result = engine.fit(&empty, &empty);
        assert!(matches!(result, Err(EngineError::EmptyTrainingSet)));
    }
}
