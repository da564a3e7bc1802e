//! Random forest of bootstrapped, feature-subsampled CART trees.

use super::tree::{RegressionTree, TreeData, TreeParams};
use super::{Classifier, balanced_weights, check_rows, check_training_data};
use crate::error::MlError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Reweight classes inversely to their frequency.
    #[serde(default = "default_true")]
    pub balanced: bool,
    #[serde(default = "default_true")]
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_leaf: default_min_samples_leaf(),
            balanced: true,
            bootstrap: true,
        }
    }
}

fn default_n_estimators() -> usize {
    500
}

fn default_max_depth() -> usize {
    5
}

fn default_min_samples_leaf() -> usize {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    seed: u64,
    trees: Vec<RegressionTree>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            trees: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "RF"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[bool]) -> Result<(), MlError> {
        let n_features = check_training_data(x, y)?;
        if self.params.n_estimators == 0 {
            return Err(MlError::model("random forest needs at least one tree"));
        }

        let n = x.len();
        let class_weights = if self.params.balanced {
            balanced_weights(y)
        } else {
            vec![1.0; n]
        };
        let targets: Vec<f64> = y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: Some(((n_features as f64).sqrt() as usize).max(1)),
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.params.n_estimators {
            // Bootstrap draws become integer sample weights on distinct rows.
            let mut counts = vec![0usize; n];
            if self.params.bootstrap {
                for _ in 0..n {
                    counts[rng.gen_range(0..n)] += 1;
                }
            } else {
                counts.fill(1);
            }
            let weights: Vec<f64> = counts
                .iter()
                .zip(&class_weights)
                .map(|(&c, &w)| c as f64 * w)
                .collect();
            let rows: Vec<usize> = (0..n).filter(|&i| counts[i] > 0).collect();

            let data = TreeData {
                x,
                targets: &targets,
                weights: &weights,
            };
            let leaf = RegressionTree::mean_leaf(&data);
            let (tree, tree_importances) =
                RegressionTree::fit(&data, &rows, &tree_params, &mut rng, &leaf);

            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                    *acc += v / total;
                }
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            trees = trees.len(),
            features = n_features,
            rows = n,
            "Random forest fitted"
        );
        self.trees = trees;
        self.n_features = n_features;
        self.importances = importances;
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, MlError> {
        if self.trees.is_empty() {
            return Err(MlError::model("random forest is not fitted"));
        }
        check_rows(x, self.n_features)?;
        let n_trees = self.trees.len() as f64;
        Ok(x.iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        (!self.importances.is_empty()).then(|| self.importances.clone())
    }
}
