//! TESLA-style evaluation of one score vector against binary labels.

use super::metrics::{
    ConfusionMatrix, average_precision, positives_in_top, rank_order, roc_auc,
};
use crate::error::MlError;
use neoimmuno_core::stats::median;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cutoffs and baseline knobs for the evaluation harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Ranks counted by the fraction-ranked metric.
    #[serde(default = "default_fr_top_k")]
    pub fr_top_k: usize,
    /// Ranks counted by the top-tier immunogenic fraction.
    #[serde(default = "default_ttif_top_k")]
    pub ttif_top_k: usize,
    /// Single-feature baselines need at least this many observed values.
    #[serde(default = "default_min_non_null")]
    pub min_non_null: usize,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            fr_top_k: default_fr_top_k(),
            ttif_top_k: default_ttif_top_k(),
            min_non_null: default_min_non_null(),
            random_seed: default_random_seed(),
        }
    }
}

fn default_fr_top_k() -> usize {
    100
}

fn default_ttif_top_k() -> usize {
    20
}

fn default_min_non_null() -> usize {
    100
}

fn default_random_seed() -> u64 {
    42
}

/// Every metric for one named score vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    pub name: String,
    /// Records left after dropping `NaN` scores.
    pub n_total: usize,
    pub n_positive: usize,
    pub n_negative: usize,
    pub n_removed: usize,
    pub auc_roc: f64,
    pub auprc: f64,
    /// Share of all positives ranked within the top `fr_k`.
    pub fr: f64,
    pub fr_k: usize,
    /// Share of the top `ttif_k` ranks that are positive.
    pub ttif: f64,
    pub ttif_k: usize,
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        name: &str,
        y_true: &[bool],
        y_score: &[f64],
    ) -> Result<MetricBundle, MlError> {
        if y_true.len() != y_score.len() {
            return Err(MlError::evaluation(format!(
                "{}: {} labels but {} scores",
                name,
                y_true.len(),
                y_score.len()
            )));
        }

        let (labels, scores): (Vec<bool>, Vec<f64>) = y_true
            .iter()
            .zip(y_score)
            .filter(|(_, s)| !s.is_nan())
            .map(|(&l, &s)| (l, s))
            .unzip();
        let n_removed = y_true.len() - labels.len();
        if n_removed > 0 {
            warn!(model = name, removed = n_removed, "NaN scores removed before evaluation");
        }

        let n_total = labels.len();
        let n_positive = labels.iter().filter(|&&l| l).count();
        let n_negative = n_total - n_positive;
        let order = rank_order(&scores);

        let fr_k = self.config.fr_top_k.min(n_total);
        let fr = if n_positive > 0 {
            positives_in_top(&labels, &order, fr_k) as f64 / n_positive as f64
        } else {
            0.0
        };

        let ttif_k = self.config.ttif_top_k.min(n_total);
        let ttif = if ttif_k > 0 {
            positives_in_top(&labels, &order, ttif_k) as f64 / ttif_k as f64
        } else {
            f64::NAN
        };

        let (threshold, precision, recall, f1) = if n_total > 0 {
            let threshold = median(&scores);
            let cm = ConfusionMatrix::at_threshold(&labels, &scores, threshold);
            (threshold, cm.precision(), cm.recall(), cm.f1())
        } else {
            (f64::NAN, f64::NAN, f64::NAN, f64::NAN)
        };

        Ok(MetricBundle {
            name: name.to_string(),
            n_total,
            n_positive,
            n_negative,
            n_removed,
            auc_roc: roc_auc(&labels, &scores),
            auprc: average_precision(&labels, &scores),
            fr,
            fr_k,
            ttif,
            ttif_k,
            threshold,
            precision,
            recall,
            f1,
        })
    }
}

/// Evaluate with the default cutoffs (top-100 FR, top-20 TTIF).
pub fn evaluate(name: &str, y_true: &[bool], y_score: &[f64]) -> Result<MetricBundle, MlError> {
    Evaluator::default().evaluate(name, y_true, y_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_scores_are_dropped() {
        let bundle = evaluate("m", &[true, true, false], &[0.9, f64::NAN, 0.1]).unwrap();
        assert_eq!(bundle.n_total, 2);
        assert_eq!(bundle.n_removed, 1);
        assert_eq!(bundle.n_positive, 1);
        assert_eq!(bundle.auc_roc, 1.0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        assert!(evaluate("m", &[true], &[0.1, 0.2]).is_err());
    }

    #[test]
    fn test_empty_after_filter() {
        let bundle = evaluate("m", &[true, false], &[f64::NAN, f64::NAN]).unwrap();
        assert_eq!(bundle.n_total, 0);
        assert!(bundle.auc_roc.is_nan());
        assert!(bundle.auprc.is_nan());
        assert_eq!(bundle.fr, 0.0);
        assert!(bundle.ttif.is_nan());
        assert!(bundle.f1.is_nan());
    }

    #[test]
    fn test_no_positives() {
        let bundle = evaluate("m", &[false, false, false], &[0.3, 0.2, 0.1]).unwrap();
        assert!(bundle.auc_roc.is_nan());
        assert!(bundle.auprc.is_nan());
        assert_eq!(bundle.fr, 0.0);
        assert_eq!(bundle.ttif, 0.0);
        assert_eq!(bundle.precision, 0.0);
    }

    #[test]
    fn test_cutoffs_clamp_to_dataset_size() {
        let y = [true, false, false, true, false];
        let s = [0.9, 0.8, 0.7, 0.2, 0.1];
        let bundle = evaluate("m", &y, &s).unwrap();
        assert_eq!(bundle.fr_k, 5);
        assert_eq!(bundle.fr, 1.0);
        assert_eq!(bundle.ttif_k, 5);
        assert_eq!(bundle.ttif, 0.4);
        // Median 0.7 → predicted positive: 0.9, 0.8, 0.7.
        assert_eq!(bundle.threshold, 0.7);
        assert!((bundle.precision - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(bundle.recall, 0.5);
    }

    #[test]
    fn test_custom_cutoffs() {
        let evaluator = Evaluator::new(EvalConfig {
            fr_top_k: 1,
            ttif_top_k: 2,
            ..EvalConfig::default()
        });
        let bundle = evaluator
            .evaluate("m", &[true, true, false], &[0.9, 0.1, 0.5])
            .unwrap();
        assert_eq!(bundle.fr, 0.5);
        assert_eq!(bundle.ttif, 0.5);
    }
}
