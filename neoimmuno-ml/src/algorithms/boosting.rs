//! Gradient boosting with log-loss and shallow regression trees.

use super::tree::{RegressionTree, TreeData, TreeParams};
use super::{Classifier, check_rows, check_training_data, sigmoid};
use crate::error::MlError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each stage.
    #[serde(default = "default_subsample")]
    pub subsample: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            min_samples_leaf: default_min_samples_leaf(),
            subsample: default_subsample(),
        }
    }
}

fn default_n_estimators() -> usize {
    200
}

fn default_max_depth() -> usize {
    3
}

fn default_learning_rate() -> f64 {
    0.05
}

fn default_min_samples_leaf() -> usize {
    5
}

fn default_subsample() -> f64 {
    0.8
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
    seed: u64,
    init: f64,
    stages: Vec<RegressionTree>,
    n_features: usize,
    importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            init: 0.0,
            stages: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
        }
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        self.init
            + self.params.learning_rate * self.stages.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &str {
        "GB"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[bool]) -> Result<(), MlError> {
        let n_features = check_training_data(x, y)?;
        let p = &self.params;
        if !(p.subsample > 0.0 && p.subsample <= 1.0) {
            return Err(MlError::model("subsample must be in (0, 1]"));
        }
        if p.learning_rate <= 0.0 {
            return Err(MlError::model("learning rate must be positive"));
        }

        let n = x.len();
        let labels: Vec<f64> = y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let prior = labels.iter().sum::<f64>() / n as f64;
        let init = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: p.max_depth,
            min_samples_leaf: p.min_samples_leaf,
            max_features: None,
        };
        let n_inbag = ((p.subsample * n as f64) as usize).clamp(1, n);
        let weights = vec![1.0; n];
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut raw = vec![init; n];
        let mut stages = Vec::with_capacity(p.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..p.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&z| sigmoid(z)).collect();
            let residuals: Vec<f64> = labels.iter().zip(&probs).map(|(l, q)| l - q).collect();

            let mut rows = if n_inbag < n {
                sample(&mut rng, n, n_inbag).into_vec()
            } else {
                (0..n).collect()
            };
            rows.sort_unstable();

            // One Newton step per leaf on the log-loss.
            let leaf = |leaf_rows: &[usize]| {
                let (num, den) = leaf_rows.iter().fold((0.0, 0.0), |(num, den), &i| {
                    (num + residuals[i], den + probs[i] * (1.0 - probs[i]))
                });
                if den.abs() < 1e-150 { 0.0 } else { num / den }
            };
            let data = TreeData {
                x,
                targets: &residuals,
                weights: &weights,
            };
            let (tree, tree_importances) =
                RegressionTree::fit(&data, &rows, &tree_params, &mut rng, &leaf);

            for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                *acc += v;
            }
            for (z, row) in raw.iter_mut().zip(x) {
                *z += p.learning_rate * tree.predict_row(row);
            }
            stages.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(stages = stages.len(), init, "Gradient boosting fitted");
        self.init = init;
        self.stages = stages;
        self.n_features = n_features;
        self.importances = importances;
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, MlError> {
        if self.n_features == 0 {
            return Err(MlError::model("gradient boosting is not fitted"));
        }
        check_rows(x, self.n_features)?;
        Ok(x.iter().map(|row| sigmoid(self.raw_score(row))).collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        (!self.importances.is_empty()).then(|| self.importances.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_estimators: usize) -> BoostingParams {
        BoostingParams {
            n_estimators,
            min_samples_leaf: 2,
            ..BoostingParams::default()
        }
    }

    fn toy() -> (Vec<Vec<f64>>, Vec<bool>) {
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let y: Vec<bool> = (0..50).map(|i| i >= 35).collect();
        (x, y)
    }

    #[test]
    fn test_zero_stages_predicts_prior() {
        let (x, y) = toy();
        let mut model = GradientBoosting::new(params(0), 1);
        model.fit(&x, &y).unwrap();
        let probs = model.predict_proba(&x[..1]).unwrap();
        assert!((probs[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_boosting_learns_threshold() {
        let (x, y) = toy();
        let mut model = GradientBoosting::new(params(50), 1);
        model.fit(&x, &y).unwrap();
        let probs = model.predict_proba(&[vec![45.0, 0.0], vec![5.0, 0.0]]).unwrap();
        assert!(probs[0] > 0.5);
        assert!(probs[1] < 0.5);
        let importances = model.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_invalid_subsample() {
        let (x, y) = toy();
        let mut model = GradientBoosting::new(
            BoostingParams {
                subsample: 0.0,
                ..BoostingParams::default()
            },
            1,
        );
        assert!(model.fit(&x, &y).is_err());
    }
}
