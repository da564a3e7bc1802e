//! Ranking and threshold metrics for binary labels.
//!
//! All functions expect `NaN`-free scores; the harness filters them first.
//! Undefined metrics come back as `NaN`.

use serde::{Deserialize, Serialize};

fn class_counts(y_true: &[bool]) -> (usize, usize) {
    let n_pos = y_true.iter().filter(|&&l| l).count();
    (n_pos, y_true.len() - n_pos)
}

/// Indices ordered by score descending. Ties keep input order.
pub fn rank_order(y_score: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[b].total_cmp(&y_score[a]));
    order
}

/// Area under the ROC curve as the Mann-Whitney U statistic with average
/// ranks for ties.
pub fn roc_auc(y_true: &[bool], y_score: &[f64]) -> f64 {
    let (n_pos, n_neg) = class_counts(y_true);
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    let mut pos_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1..=end share their mean.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let tied_pos = order[start..end].iter().filter(|&&i| y_true[i]).count();
        pos_rank_sum += avg_rank * tied_pos as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    u / (n_pos * n_neg as f64)
}

/// Step-wise average precision, `Σ (R_k − R_{k−1}) · P_k`, with one step per
/// distinct score.
pub fn average_precision(y_true: &[bool], y_score: &[f64]) -> f64 {
    let (n_pos, _) = class_counts(y_true);
    if n_pos == 0 {
        return f64::NAN;
    }

    let order = rank_order(y_score);
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        for &i in &order[start..end] {
            if y_true[i] { tp += 1 } else { fp += 1 }
        }
        let recall = tp as f64 / n_pos as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
        start = end;
    }
    ap
}

/// Positives among the first `k` entries of `order`.
pub fn positives_in_top(y_true: &[bool], order: &[usize], k: usize) -> usize {
    order.iter().take(k).filter(|&&i| y_true[i]).count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    /// Predict positive where `score >= threshold`.
    pub fn at_threshold(y_true: &[bool], y_score: &[f64], threshold: f64) -> Self {
        let mut cm = Self::default();
        for (&label, &score) in y_true.iter().zip(y_score) {
            match (label, score >= threshold) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        cm
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        ratio(
            2 * self.true_positive,
            2 * self.true_positive + self.false_positive + self.false_negative,
        )
    }
}

/// Zero division yields `0.0`.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_auc_known_values() {
        let y = [false, false, true, true];
        assert_eq!(roc_auc(&y, &[0.1, 0.4, 0.35, 0.8]), 0.75);
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.3, 0.4]), 1.0);
        assert_eq!(roc_auc(&y, &[0.4, 0.3, 0.2, 0.1]), 0.0);
    }

    #[test]
    fn test_roc_auc_ties_count_half() {
        let y = [false, true];
        assert_eq!(roc_auc(&y, &[0.5, 0.5]), 0.5);
        assert_eq!(roc_auc(&[false, false, true], &[0.2, 0.5, 0.5]), 0.75);
    }

    #[test]
    fn test_roc_auc_single_class_is_nan() {
        assert!(roc_auc(&[true, true], &[0.1, 0.2]).is_nan());
        assert!(roc_auc(&[], &[]).is_nan());
    }

    #[test]
    fn test_average_precision_known_values() {
        let y = [false, false, true, true];
        // Ranked: 0.8(+), 0.4(-), 0.35(+), 0.1(-) → 0.5·1 + 0.5·(2/3).
        let ap = average_precision(&y, &[0.1, 0.4, 0.35, 0.8]);
        assert!((ap - (0.5 + 1.0 / 3.0)).abs() < 1e-12);
        assert!(average_precision(&[false, false], &[0.1, 0.2]).is_nan());
    }

    #[test]
    fn test_average_precision_groups_ties() {
        // A single tied block: precision is the base rate.
        let ap = average_precision(&[true, false, false, false], &[0.5; 4]);
        assert_eq!(ap, 0.25);
    }

    #[test]
    fn test_rank_order_is_stable() {
        assert_eq!(rank_order(&[0.5, 0.9, 0.5, 0.1]), vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_confusion_matrix_zero_division() {
        let cm = ConfusionMatrix::at_threshold(&[false, false], &[0.1, 0.2], 0.5);
        assert_eq!(cm.true_negative, 2);
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.recall(), 0.0);
        assert_eq!(cm.f1(), 0.0);
    }

    #[test]
    fn test_confusion_matrix_scores() {
        let cm = ConfusionMatrix::at_threshold(
            &[true, true, false, false],
            &[0.9, 0.2, 0.7, 0.1],
            0.5,
        );
        assert_eq!(cm.precision(), 0.5);
        assert_eq!(cm.recall(), 0.5);
        assert_eq!(cm.f1(), 0.5);
    }
}
