//! Error analysis of a ranked score vector: per-group metrics, rank
//! breakdowns and class-conditional feature means.

use super::harness::EvalConfig;
use super::metrics::{average_precision, rank_order, roc_auc};
use crate::error::MlError;
use neoimmuno_core::PeptideRecord;
use neoimmuno_core::data::FeatureTable;
use neoimmuno_core::stats::median;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    pub group: String,
    pub n_total: usize,
    pub n_positive: usize,
    /// `NaN` unless the group contains both classes.
    pub auc_roc: f64,
    pub auprc: f64,
}

impl GroupMetrics {
    pub fn is_defined(&self) -> bool {
        self.n_positive > 0 && self.n_positive < self.n_total
    }
}

fn check_lengths(y_true: &[bool], y_score: &[f64], other: usize) -> Result<(), MlError> {
    if y_true.len() != y_score.len() || y_true.len() != other {
        return Err(MlError::evaluation(format!(
            "length mismatch: {} labels, {} scores, {} keys",
            y_true.len(),
            y_score.len(),
            other
        )));
    }
    Ok(())
}

/// AUC-ROC and AUPRC within each group, in sorted group order.
///
/// `NaN` scores are ignored. Metrics are only computed for groups with
/// both classes present.
pub fn per_group_metrics<S: AsRef<str>>(
    y_true: &[bool],
    y_score: &[f64],
    groups: &[S],
) -> Result<Vec<GroupMetrics>, MlError> {
    check_lengths(y_true, y_score, groups.len())?;

    let mut members: BTreeMap<&str, (Vec<bool>, Vec<f64>)> = BTreeMap::new();
    for ((&label, &score), group) in y_true.iter().zip(y_score).zip(groups) {
        if score.is_nan() {
            continue;
        }
        let entry = members.entry(group.as_ref()).or_default();
        entry.0.push(label);
        entry.1.push(score);
    }

    Ok(members
        .into_iter()
        .map(|(group, (labels, scores))| {
            let n_positive = labels.iter().filter(|&&l| l).count();
            let both = n_positive > 0 && n_positive < labels.len();
            GroupMetrics {
                group: group.to_string(),
                n_total: labels.len(),
                n_positive,
                auc_roc: if both { roc_auc(&labels, &scores) } else { f64::NAN },
                auprc: if both {
                    average_precision(&labels, &scores)
                } else {
                    f64::NAN
                },
            }
        })
        .collect())
}

/// One record at its position in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub index: usize,
    /// 1-indexed.
    pub rank: usize,
    pub score: f64,
    pub peptide: String,
    pub allele: String,
    pub patient_id: Option<String>,
    pub predicted_affinity: f64,
    pub binding_stability: f64,
    pub tumor_abundance: f64,
}

/// Positives found within the top `k` for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub key: String,
    pub detected: usize,
    pub positives: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthRate {
    pub length: usize,
    pub positives: usize,
    pub total: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankAnalysis {
    pub n_total: usize,
    pub n_positive: usize,
    pub median_rank_positive: f64,
    pub median_rank_negative: f64,
    /// Positives ranked outside the top `fr_top_k`, worst first.
    pub false_negatives: Vec<RankedRecord>,
    /// Negatives ranked inside the top `ttif_top_k`, best first.
    pub false_positives: Vec<RankedRecord>,
    /// Positives ranked inside the top `ttif_top_k`, best first.
    pub true_positives: Vec<RankedRecord>,
    pub by_group: Vec<Detection>,
    pub by_allele: Vec<Detection>,
    pub by_length: Vec<LengthRate>,
}

/// Break a ranking down by where positives and negatives land.
///
/// Records need labels; records with a `NaN` score are left out.
pub fn rank_analysis(
    records: &[PeptideRecord],
    y_score: &[f64],
    config: &EvalConfig,
) -> Result<RankAnalysis, MlError> {
    if records.len() != y_score.len() {
        return Err(MlError::evaluation(format!(
            "{} records but {} scores",
            records.len(),
            y_score.len()
        )));
    }

    let mut kept: Vec<usize> = Vec::with_capacity(records.len());
    let mut labels = Vec::with_capacity(records.len());
    for (i, (record, score)) in records.iter().zip(y_score).enumerate() {
        if score.is_nan() {
            continue;
        }
        let label = record
            .immunogenic
            .ok_or_else(|| MlError::dataset(format!("record {i} has no label")))?;
        kept.push(i);
        labels.push(label);
    }
    let scores: Vec<f64> = kept.iter().map(|&i| y_score[i]).collect();

    let mut ranks = vec![0usize; kept.len()];
    for (position, &k) in rank_order(&scores).iter().enumerate() {
        ranks[k] = position + 1;
    }

    let ranked = |k: usize| {
        let record = &records[kept[k]];
        RankedRecord {
            index: kept[k],
            rank: ranks[k],
            score: scores[k],
            peptide: record.peptide.clone(),
            allele: record.allele.clone(),
            patient_id: record.patient_id.clone(),
            predicted_affinity: record.covariates.predicted_affinity,
            binding_stability: record.covariates.binding_stability,
            tumor_abundance: record.covariates.tumor_abundance,
        }
    };

    let positives: Vec<usize> = (0..kept.len()).filter(|&k| labels[k]).collect();
    let negatives: Vec<usize> = (0..kept.len()).filter(|&k| !labels[k]).collect();
    let rank_median = |idx: &[usize]| {
        let r: Vec<f64> = idx.iter().map(|&k| ranks[k] as f64).collect();
        median(&r)
    };

    let mut false_negatives: Vec<RankedRecord> = positives
        .iter()
        .filter(|&&k| ranks[k] > config.fr_top_k)
        .map(|&k| ranked(k))
        .collect();
    false_negatives.sort_by(|a, b| b.rank.cmp(&a.rank));

    let mut false_positives: Vec<RankedRecord> = negatives
        .iter()
        .filter(|&&k| ranks[k] <= config.ttif_top_k)
        .map(|&k| ranked(k))
        .collect();
    false_positives.sort_by_key(|r| r.rank);

    let mut true_positives: Vec<RankedRecord> = positives
        .iter()
        .filter(|&&k| ranks[k] <= config.ttif_top_k)
        .map(|&k| ranked(k))
        .collect();
    true_positives.sort_by_key(|r| r.rank);

    let detection = |key_of: &dyn Fn(&PeptideRecord) -> String| {
        let mut table: BTreeMap<String, Detection> = BTreeMap::new();
        for k in 0..kept.len() {
            let key = key_of(&records[kept[k]]);
            let entry = table.entry(key.clone()).or_insert(Detection {
                key,
                detected: 0,
                positives: 0,
                total: 0,
            });
            entry.total += 1;
            if labels[k] {
                entry.positives += 1;
                if ranks[k] <= config.fr_top_k {
                    entry.detected += 1;
                }
            }
        }
        table
            .into_values()
            .filter(|d| d.positives > 0)
            .collect::<Vec<_>>()
    };
    let by_group = detection(&|r| r.patient_id.clone().unwrap_or_default());
    let by_allele = detection(&|r| r.allele.clone());

    let mut lengths: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
    for k in 0..kept.len() {
        let entry = lengths.entry(records[kept[k]].peptide_length).or_default();
        entry.1 += 1;
        if labels[k] {
            entry.0 += 1;
        }
    }
    let by_length = lengths
        .into_iter()
        .map(|(length, (positives, total))| LengthRate {
            length,
            positives,
            total,
            rate: positives as f64 / total as f64,
        })
        .collect();

    Ok(RankAnalysis {
        n_total: kept.len(),
        n_positive: positives.len(),
        median_rank_positive: rank_median(&positives),
        median_rank_negative: rank_median(&negatives),
        false_negatives,
        false_positives,
        true_positives,
        by_group,
        by_allele,
        by_length,
    })
}

/// Mean of one feature in each class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMeans {
    pub feature: String,
    pub positive_mean: f64,
    pub negative_mean: f64,
    /// `positive_mean / negative_mean`; infinite when the negative mean is 0.
    pub ratio: f64,
}

/// Class-conditional means over observed values for each named column
/// present in `table`.
pub fn class_means<S: AsRef<str>>(
    table: &FeatureTable,
    y_true: &[bool],
    features: &[S],
) -> Result<Vec<ClassMeans>, MlError> {
    if y_true.len() != table.n_rows() {
        return Err(MlError::evaluation(format!(
            "{} labels for {} rows",
            y_true.len(),
            table.n_rows()
        )));
    }

    let nan_mean = |values: &[f64], class: bool| {
        let (sum, count) = values
            .iter()
            .zip(y_true)
            .filter(|(v, l)| **l == class && !v.is_nan())
            .fold((0.0, 0usize), |(s, c), (v, _)| (s + v, c + 1));
        if count == 0 { f64::NAN } else { sum / count as f64 }
    };

    Ok(features
        .iter()
        .filter_map(|name| {
            let column = table.column(name.as_ref())?;
            let positive_mean = nan_mean(column, true);
            let negative_mean = nan_mean(column, false);
            let ratio = if negative_mean == 0.0 {
                f64::INFINITY
            } else {
                positive_mean / negative_mean
            };
            Some(ClassMeans {
                feature: name.as_ref().to_string(),
                positive_mean,
                negative_mean,
                ratio,
            })
        })
        .collect())
}

/// The `n` most important features.
pub fn top_importances(ranked: &[(String, f64)], n: usize) -> Vec<(String, f64)> {
    ranked.iter().take(n).cloned().collect()
}
