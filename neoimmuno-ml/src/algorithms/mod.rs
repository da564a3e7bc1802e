//! Native binary classifiers behind a `fit` / `predict_proba` seam.
//!
//! Cross-validation only ever sees [`Classifier`] trait objects built fresh
//! per fold from a [`ModelSpec`], so no fitted state can leak between folds.

pub mod boosting;
pub mod forest;
pub mod logistic;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use logistic::{LogisticParams, LogisticRegression};

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// A probabilistic binary classifier.
pub trait Classifier {
    /// Short display name, e.g. `RF`.
    fn name(&self) -> &str;

    /// Fit on row-major `x` (no missing values) and binary labels.
    fn fit(&mut self, x: &[Vec<f64>], y: &[bool]) -> Result<(), MlError>;

    /// Probability of the positive class for each row.
    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, MlError>;

    /// Normalized impurity-based importances, for models that have them.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Declarative model choice, serializable into config and result manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticParams),
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
}

impl ModelSpec {
    /// A fresh, unfitted model.
    pub fn build(&self, seed: u64) -> Box<dyn Classifier> {
        match self {
            Self::LogisticRegression(p) => Box::new(LogisticRegression::new(p.clone())),
            Self::RandomForest(p) => Box::new(RandomForest::new(p.clone(), seed)),
            Self::GradientBoosting(p) => Box::new(GradientBoosting::new(p.clone(), seed)),
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::LogisticRegression(_) => "LR",
            Self::RandomForest(_) => "RF",
            Self::GradientBoosting(_) => "GB",
        }
    }
}

/// Shape and content checks shared by every `fit`.
pub(crate) fn check_training_data(x: &[Vec<f64>], y: &[bool]) -> Result<usize, MlError> {
    if x.is_empty() {
        return Err(MlError::training("no training rows"));
    }
    if x.len() != y.len() {
        return Err(MlError::training(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let n_features = x[0].len();
    check_rows(x, n_features)?;
    let n_pos = y.iter().filter(|&&l| l).count();
    if n_pos == 0 || n_pos == y.len() {
        return Err(MlError::training("training labels contain a single class"));
    }
    Ok(n_features)
}

/// Every row has `n_features` finite values.
pub(crate) fn check_rows(x: &[Vec<f64>], n_features: usize) -> Result<(), MlError> {
    for (i, row) in x.iter().enumerate() {
        if row.len() != n_features {
            return Err(MlError::invalid_input(format!(
                "row {i} has {} features, expected {n_features}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(MlError::invalid_input(format!(
                "row {i} contains a non-finite value; impute before fitting"
            )));
        }
    }
    Ok(())
}

/// `n / (2 * n_class)` per sample, the usual balanced weighting.
pub(crate) fn balanced_weights(y: &[bool]) -> Vec<f64> {
    let n = y.len() as f64;
    let n_pos = y.iter().filter(|&&l| l).count() as f64;
    let n_neg = n - n_pos;
    let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 0.0 };
    let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 0.0 };
    y.iter().map(|&l| if l { w_pos } else { w_neg }).collect()
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_weights() {
        let w = balanced_weights(&[true, false, false, false]);
        assert_eq!(w, vec![2.0, 2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0]);
        let total_pos: f64 = w[..1].iter().sum();
        let total_neg: f64 = w[1..].iter().sum();
        assert!((total_pos - total_neg).abs() < 1e-12);
    }

    #[test]
    fn test_check_training_data_rejects_single_class() {
        let x = vec![vec![1.0], vec![2.0]];
        assert!(check_training_data(&x, &[true, true]).is_err());
        assert!(check_training_data(&x, &[true]).is_err());
        assert_eq!(check_training_data(&x, &[true, false]).unwrap(), 1);
    }

    #[test]
    fn test_check_rows_rejects_nan() {
        assert!(check_rows(&[vec![1.0, f64::NAN]], 2).is_err());
        assert!(check_rows(&[vec![1.0]], 2).is_err());
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(1000.0) <= 1.0);
    }

    #[test]
    fn test_model_spec_serde_tagged() {
        let spec = ModelSpec::RandomForest(ForestParams::default());
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "random_forest");
        let back: ModelSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.short_name(), "RF");
    }
}
