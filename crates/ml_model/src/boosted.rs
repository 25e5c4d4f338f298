//! Gradient-boosted regression trees: the optional higher-capacity engine.
//!
//! The serializable [`BoostedModel`] is always compiled so artifacts trained
//! elsewhere stay loadable; the training side ([`BoostedTreeEngine`]) sits
//! behind the `boosted` cargo feature. Trees are grown greedily on squared
//! error over the current residuals, with row and column subsampling and
//! early stopping against the validation split.

use serde::{Deserialize, Serialize};

/// One node of a flat tree arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree over standardized features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Walks the tree for one feature row. Rows go left when
    /// `value <= threshold`.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    index = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// The fitted boosted ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedModel {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl BoostedModel {
    /// Predicts the transformed target for one standardized feature row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let boost: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        self.learning_rate.mul_add(boost, self.base_score)
    }

    /// Deserializes a booster from its artifact representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a serialized booster.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

#[cfg(feature = "boosted")]
pub use fit::{BoostedConfig, BoostedTreeEngine};

#[cfg(feature = "boosted")]
mod fit {
    use tracing::debug;

    use super::{BoostedModel, RegressionTree, TreeNode};
    use crate::engine::{DesignMatrix, EngineError, RegressionEngine};
    use crate::{EngineKind, EngineParams};

    /// Hyperparameters for the boosted engine.
    #[derive(Debug, Clone)]
    pub struct BoostedConfig {
        /// Maximum boosting rounds.
        pub rounds: usize,
        /// Shrinkage applied to each tree's contribution.
        pub learning_rate: f64,
        /// Maximum tree depth.
        pub max_depth: usize,
        /// Fraction of rows sampled per round.
        pub subsample: f64,
        /// Fraction of feature columns sampled per round.
        pub colsample: f64,
        /// Minimum rows per leaf.
        pub min_leaf: usize,
        /// Stop after this many rounds without validation improvement.
        pub early_stopping_rounds: usize,
        /// Seed for row/column subsampling.
        pub seed: u64,
    }

    impl Default for BoostedConfig {
        fn default() -> Self {
            Self {
                rounds: 200,
                learning_rate: 0.1,
                max_depth: 6,
                subsample: 0.8,
                colsample: 0.8,
                min_leaf: 2,
                early_stopping_rounds: 20,
                seed: 42,
            }
        }
    }

    /// The optional gradient-boosted-tree engine.
    pub struct BoostedTreeEngine {
        config: BoostedConfig,
        model: Option<BoostedModel>,
    }

    impl BoostedTreeEngine {
        #[must_use]
        pub const fn new(config: BoostedConfig) -> Self {
            Self {
                config,
                model: None,
            }
        }
    }

    impl RegressionEngine for BoostedTreeEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Boosted
        }

        fn fit(
            &mut self,
            train: &DesignMatrix,
            validation: &DesignMatrix,
        ) -> Result<(), EngineError> {
            let row_count = train.len();
            if row_count == 0 {
                return Err(EngineError::EmptyTrainingSet);
            }
            let arity = train.features[0].len();

            let base_score = train.targets.iter().sum::<f64>() / row_count as f64;
            if !base_score.is_finite() {
                return Err(EngineError::Fit("non-finite base score".to_string()));
            }

            let mut predictions_train = vec![base_score; row_count];
            let mut predictions_val = vec![base_score; validation.len()];
            let mut rng = Lcg::new(self.config.seed);
            let mut trees: Vec<RegressionTree> = Vec::new();

            // Early stopping tracks the best tree count, not just the last.
            let mut best_rmse = if validation.is_empty() {
                rmse(&train.targets, &predictions_train)
            } else {
                rmse(&validation.targets, &predictions_val)
            };
            let mut best_len = 0;
            let mut rounds_without_improvement = 0;

            for round in 0..self.config.rounds {
                let residuals: Vec<f64> = train
                    .targets
                    .iter()
                    .zip(&predictions_train)
                    .map(|(y, p)| y - p)
                    .collect();

                let rows = rng.sample_indices(row_count, self.config.subsample);
                let cols = rng.sample_indices(arity, self.config.colsample);

                let tree = grow_tree(
                    &train.features,
                    &residuals,
                    &rows,
                    &cols,
                    self.config.max_depth,
                    self.config.min_leaf,
                );

                for (prediction, row) in predictions_train.iter_mut().zip(&train.features) {
                    *prediction += self.config.learning_rate * tree.predict_row(row);
                }
                for (prediction, row) in predictions_val.iter_mut().zip(&validation.features) {
                    *prediction += self.config.learning_rate * tree.predict_row(row);
                }
                trees.push(tree);

                let score = if validation.is_empty() {
                    rmse(&train.targets, &predictions_train)
                } else {
                    rmse(&validation.targets, &predictions_val)
                };
                if !score.is_finite() {
                    return Err(EngineError::Fit(format!(
                        "non-finite validation score at round {round}"
                    )));
                }

                if score + 1e-12 < best_rmse {
                    best_rmse = score;
                    best_len = trees.len();
                    rounds_without_improvement = 0;
                } else {
                    rounds_without_improvement += 1;
                    if rounds_without_improvement >= self.config.early_stopping_rounds {
                        debug!(round, best_len, "boosted early stopping");
                        break;
                    }
                }
            }

            trees.truncate(best_len);
            debug!(trees = trees.len(), best_rmse, "boosted fit finished");

            self.model = Some(BoostedModel {
                base_score,
                learning_rate: self.config.learning_rate,
                trees,
            });
            Ok(())
        }

        fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
            match &self.model {
                Some(model) => features.iter().map(|row| model.predict_row(row)).collect(),
                None => vec![0.0; features.len()],
            }
        }

        fn params(&self) -> EngineParams {
            let value = self
                .model
                .as_ref()
                .and_then(|model| serde_json::to_value(model).ok())
                .unwrap_or(serde_json::Value::Null);
            EngineParams::Booster(value)
        }
    }

    fn rmse(truth: &[f64], predictions: &[f64]) -> f64 {
        let count = truth.len().max(1) as f64;
        (truth
            .iter()
            .zip(predictions)
            .map(|(t, p)| (t - p) * (t - p))
            .sum::<f64>()
            / count)
            .sqrt()
    }

    /// Deterministic LCG used for row/column subsampling.
    struct Lcg {
        state: u64,
    }

    impl Lcg {
        const fn new(seed: u64) -> Self {
            Self {
                state: seed.wrapping_add(12345),
            }
        }

        fn next(&mut self) -> u64 {
            self.state = self
                .state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1);
            self.state >> 33
        }

        /// Samples `ceil(fraction * n)` distinct indices, returned sorted.
        fn sample_indices(&mut self, n: usize, fraction: f64) -> Vec<usize> {
            let take = ((n as f64 * fraction).round() as usize).clamp(1, n.max(1));
            let mut indices: Vec<usize> = (0..n).collect();
            for i in (1..indices.len()).rev() {
                let j = (self.next() as usize) % (i + 1);
                indices.swap(i, j);
            }
            indices.truncate(take);
            indices.sort_unstable();
            indices
        }
    }

    /// Grows one depth-limited tree on the residuals of the sampled rows.
    fn grow_tree(
        features: &[Vec<f64>],
        residuals: &[f64],
        rows: &[usize],
        cols: &[usize],
        max_depth: usize,
        min_leaf: usize,
    ) -> RegressionTree {
        let mut nodes = Vec::new();
        build_node(
            &mut nodes, features, residuals, rows, cols, 0, max_depth, min_leaf,
        );
        RegressionTree { nodes }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_node(
        nodes: &mut Vec<TreeNode>,
        features: &[Vec<f64>],
        residuals: &[f64],
        rows: &[usize],
        cols: &[usize],
        depth: usize,
        max_depth: usize,
        min_leaf: usize,
    ) -> usize {
        let index = nodes.len();
        let mean = if rows.is_empty() {
            0.0
        } else {
            rows.iter().map(|&r| residuals[r]).sum::<f64>() / rows.len() as f64
        };
        nodes.push(TreeNode::Leaf { value: mean });

        if depth >= max_depth || rows.len() < 2 * min_leaf {
            return index;
        }

        let Some((feature, threshold)) = best_split(features, residuals, rows, cols, min_leaf)
        else {
            return index;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| features[r][feature] <= threshold);

        let left = build_node(
            nodes, features, residuals, &left_rows, cols, depth + 1, max_depth, min_leaf,
        );
        let right = build_node(
            nodes, features, residuals, &right_rows, cols, depth + 1, max_depth, min_leaf,
        );
        nodes[index] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Finds the squared-error-optimal split over the sampled columns.
    ///
    /// Maximizes `sum_l²/n_l + sum_r²/n_r`, which is equivalent to the SSE
    /// reduction against the parent node.
    fn best_split(
        features: &[Vec<f64>],
        residuals: &[f64],
        rows: &[usize],
        cols: &[usize],
        min_leaf: usize,
    ) -> Option<(usize, f64)> {
        let total: f64 = rows.iter().map(|&r| residuals[r]).sum();
        let count = rows.len() as f64;
        let parent_score = total * total / count;

        let mut best: Option<(usize, f64, f64)> = None;

        for &col in cols {
            let mut pairs: Vec<(f64, f64)> = rows
                .iter()
                .map(|&r| (features[r][col], residuals[r]))
                .collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            for (i, window) in pairs.windows(2).enumerate() {
                left_sum += window[0].1;
                if window[0].0 == window[1].0 {
                    continue;
                }

                let left_count = (i + 1) as f64;
                let right_count = count - left_count;
                if (i + 1) < min_leaf || (rows.len() - i - 1) < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let score =
                    left_sum * left_sum / left_count + right_sum * right_sum / right_count;

                if score > best.map_or(parent_score + 1e-12, |(_, _, s)| s) {
                    let threshold = (window[0].0 + window[1].0) / 2.0;
                    best = Some((col, threshold, score));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn nonlinear_matrix(n: usize) -> DesignMatrix {
            // y = x² is invisible to a linear model but easy for trees.
            let features: Vec<Vec<f64>> = (0..n)
                .map(|i| {
                    let x = (i as f64 / n as f64) * 4.0 - 2.0;
                    vec![1.0, x]
                })
                .collect();
            let targets = features.iter().map(|row| row[1] * row[1]).collect();
            DesignMatrix { features, targets }
        }

        #[test]
        fn test_boosted_engine_fits_nonlinear_target() {
            let train = nonlinear_matrix(200);
            let validation = nonlinear_matrix(50);

            let mut engine = BoostedTreeEngine::new(BoostedConfig::default());
            engine.fit(&train, &validation).expect("fit should succeed");

            let predictions = engine.predict(&validation.features);
            let score = rmse(&validation.targets, &predictions);

            // The constant base predictor is far worse than this on y = x².
            let base = train.targets.iter().sum::<f64>() / train.targets.len() as f64;
            let baseline = rmse(&validation.targets, &vec![base; validation.len()]);
            assert!(
                score < baseline / 2.0,
                "boosting did not improve over base: {score} vs {baseline}"
            );
        }

        #[test]
        fn test_constant_target_predicts_base() {
            let features: Vec<Vec<f64>> = (0..20).map(|i| vec![1.0, f64::from(i)]).collect();
            let targets = vec![3.5; 20];
            let train = DesignMatrix { features, targets };

            let mut engine = BoostedTreeEngine::new(BoostedConfig::default());
            engine
                .fit(&train, &DesignMatrix::default())
                .expect("fit should succeed");

            for prediction in engine.predict(&train.features) {
                assert!((prediction - 3.5).abs() < 1e-9);
            }
        }

        #[test]
        fn test_booster_params_round_trip() {
            let train = nonlinear_matrix(80);
            let mut engine = BoostedTreeEngine::new(BoostedConfig {
                rounds: 10,
                ..BoostedConfig::default()
            });
            engine
                .fit(&train, &DesignMatrix::default())
                .expect("fit should succeed");

            let EngineParams::Booster(value) = engine.params() else {
                panic!("expected booster params");
            };
            let model = BoostedModel::from_value(&value).expect("deserialize");

            let direct = engine.predict(&train.features);
            for (row, expected) in train.features.iter().zip(direct) {
                assert!((model.predict_row(row) - expected).abs() < 1e-12);
            }
        }

        #[test]
        fn test_empty_training_set_is_an_error() {
            let mut engine = BoostedTreeEngine::new(BoostedConfig::default());
            let empty = DesignMatrix::default();
            assert!(matches!(
                engine.fit(&empty, &empty),
                Err(EngineError::EmptyTrainingSet)
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_tree_prediction() {
        let tree = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 1,
                    threshold: 0.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: -1.0 },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        let model = BoostedModel {
            base_score: 10.0,
            learning_rate: 0.5,
            trees: vec![tree],
        };

        assert!((model.predict_row(&[1.0, -3.0]) - 9.5).abs() < 1e-12);
        assert!((model.predict_row(&[1.0, 3.0]) - 10.5).abs() < 1e-12);
    }

    #[test]
    fn test_model_round_trips_through_json() {
        let model = BoostedModel {
            base_score: 2.0,
            learning_rate: 0.1,
            trees: vec![RegressionTree {
                nodes: vec![TreeNode::Leaf { value: 0.25 }],
            }],
        };

        let value = serde_json::to_value(&model).expect("serialize");
        let back = BoostedModel::from_value(&value).expect("deserialize");
        assert!((back.predict_row(&[0.0]) - model.predict_row(&[0.0])).abs() < 1e-12);
    }
}
