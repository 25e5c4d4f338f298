//! Dataset and batching for Burn training.

use burn::prelude::*;

/// A single standardized, transformed training item.
#[derive(Debug, Clone)]
pub struct LabeledItem {
    /// Standardized feature vector.
    pub features: Vec<f32>,
    /// Transformed target value.
    pub target: f32,
}

/// In-memory dataset over labeled items.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    items: Vec<LabeledItem>,
}

impl LabeledDataset {
    /// Builds a dataset from parallel feature/target slices.
    #[must_use]
    pub fn new(features: &[Vec<f64>], targets: &[f64]) -> Self {
        let items = features
            .iter()
            .zip(targets)
            .map(|(row, target)| LabeledItem {
                features: row.iter().map(|v| *v as f32).collect(),
                target: *target as f32,
            })
            .collect();
        Self { items }
    }
}

impl burn::data::dataset::Dataset<LabeledItem> for LabeledDataset {
    fn get(&self, index: usize) -> Option<LabeledItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A batch of training data.
#[derive(Debug, Clone)]
pub struct LabeledBatch<B: Backend> {
    /// Input features tensor of shape `[batch_size, arity]`.
    pub inputs: Tensor<B, 2>,
    /// Target values tensor of shape `[batch_size, 1]`.
    pub targets: Tensor<B, 2>,
}

/// Batcher for creating training batches.
#[derive(Debug, Clone)]
pub struct RowBatcher<B: Backend> {
    device: B::Device,
    arity: usize,
}

impl<B: Backend> RowBatcher<B> {
    /// Creates a new batcher for the given device and feature arity.
    #[must_use]
    pub const fn new(device: B::Device, arity: usize) -> Self {
        Self { device, arity }
    }

    /// Creates a batch from a vector of items.
    pub fn batch(&self, items: Vec<LabeledItem>) -> LabeledBatch<B> {
        let batch_size = items.len();

        let mut features_data = Vec::with_capacity(batch_size * self.arity);
        let mut targets_data = Vec::with_capacity(batch_size);

        for item in items {
            features_data.extend_from_slice(&item.features);
            targets_data.push(item.target);
        }

        let inputs = Tensor::<B, 1>::from_floats(features_data.as_slice(), &self.device)
            .reshape([batch_size, self.arity]);

        let targets = Tensor::<B, 1>::from_floats(targets_data.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        LabeledBatch { inputs, targets }
    }
}
