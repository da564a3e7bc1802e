//! IEDB transfer learning: fit on sequence composition from the public
//! T-cell corpus, then score TESLA peptides that were never seen in training.

use crate::algorithms::{ForestParams, ModelSpec};
use crate::benchmark::TRANSFER_SCORE_COLUMN;
use crate::config::TransferConfig;
use crate::error::MlError;
use crate::eval::{Evaluator, MetricBundle, top_importances};
use crate::training::{Dataset, FittedModel, SeedSequence, labels_of};
use neoimmuno_core::data::{FeatureTable, IedbFilter, IedbPair, IedbRecord, prepare_training_pairs};
use neoimmuno_core::record::{PeptideRecord, normalize_allele};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Random forest over sequence-only features.
pub struct TransferModel {
    fitted: FittedModel,
    n_train: usize,
    n_positive: usize,
}

impl TransferModel {
    pub fn train(pairs: &[IedbPair], params: &ForestParams, seed: u64) -> Result<Self, MlError> {
        let y: Vec<bool> = pairs.iter().map(|p| p.immunogenic).collect();
        let n_positive = y.iter().filter(|&&l| l).count();
        if n_positive == 0 || n_positive == y.len() {
            return Err(MlError::training(format!(
                "transfer training set has {} pairs, {n_positive} positive; both classes are required",
                y.len()
            )));
        }
        let peptides: Vec<&str> = pairs.iter().map(|p| p.peptide.as_str()).collect();
        let groups: Vec<String> = pairs.iter().map(|p| p.allele.clone()).collect();
        let data = Dataset::from_table(&FeatureTable::from_sequences(&peptides), y, groups)?;
        let fitted = FittedModel::fit(&ModelSpec::RandomForest(params.clone()), &data, seed)?;
        info!(pairs = pairs.len(), positives = n_positive, "Trained transfer model");
        Ok(Self {
            fitted,
            n_train: pairs.len(),
            n_positive,
        })
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn n_positive(&self) -> usize {
        self.n_positive
    }

    /// Immunogenic probability per peptide.
    pub fn score<S: AsRef<str>>(&self, peptides: &[S]) -> Result<Vec<f64>, MlError> {
        self.fitted.predict_table(&FeatureTable::from_sequences(peptides))
    }

    pub fn score_records(&self, records: &[PeptideRecord]) -> Result<Vec<f64>, MlError> {
        let peptides: Vec<&str> = records.iter().map(|r| r.peptide.as_str()).collect();
        self.score(&peptides)
    }

    pub fn importances(&self, n: usize) -> Vec<(String, f64)> {
        self.fitted
            .ranked_importances()
            .map(|ranked| top_importances(&ranked, n))
            .unwrap_or_default()
    }
}

/// Result of one transfer model scored on (a subset of) TESLA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub allele: Option<String>,
    pub lengths: Vec<usize>,
    pub n_train: usize,
    pub n_train_positive: usize,
    pub metrics: MetricBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReport {
    pub pan_allele: TransferOutcome,
    pub allele_specific: Option<TransferOutcome>,
    /// Pan-allele score for every TESLA record, in input order.
    pub scores: Vec<f64>,
    pub top_features: Vec<(String, f64)>,
}

/// Train the pan-allele model (and the allele-specific one when configured)
/// and evaluate both on labelled TESLA records.
pub fn run_transfer(
    iedb: &[IedbRecord],
    tesla: &[PeptideRecord],
    config: &TransferConfig,
    evaluator: &Evaluator,
    seeds: &mut SeedSequence,
) -> Result<TransferReport, MlError> {
    let y_true = labels_of(tesla)?;

    let pan_filter = IedbFilter {
        allele: config.allele.as_deref().map(normalize_allele),
        lengths: Some(config.lengths.clone()),
    };
    let pairs = prepare_training_pairs(iedb, &pan_filter, config.strategy);
    let pan = TransferModel::train(&pairs, &config.forest, seeds.derive("transfer_pan"))?;
    let scores = pan.score_records(tesla)?;
    let metrics = evaluator.evaluate("IEDB transfer (pan-allele)", &y_true, &scores)?;
    info!(auc_roc = metrics.auc_roc, auprc = metrics.auprc, "Pan-allele transfer evaluated");
    let pan_allele = TransferOutcome {
        allele: pan_filter.allele.clone(),
        lengths: config.lengths.clone(),
        n_train: pan.n_train(),
        n_train_positive: pan.n_positive(),
        metrics,
    };

    let allele_specific = match &config.specific_allele {
        Some(allele) => run_allele_specific(iedb, tesla, &y_true, allele, config, evaluator, seeds)?,
        None => None,
    };

    Ok(TransferReport {
        pan_allele,
        allele_specific,
        scores,
        top_features: pan.importances(15),
    })
}

fn run_allele_specific(
    iedb: &[IedbRecord],
    tesla: &[PeptideRecord],
    y_true: &[bool],
    allele: &str,
    config: &TransferConfig,
    evaluator: &Evaluator,
    seeds: &mut SeedSequence,
) -> Result<Option<TransferOutcome>, MlError> {
    let allele = normalize_allele(allele);
    let filter = IedbFilter {
        allele: Some(allele.clone()),
        lengths: Some(config.specific_lengths.clone()),
    };
    let pairs = prepare_training_pairs(iedb, &filter, config.strategy);
    let model = match TransferModel::train(&pairs, &config.forest, seeds.derive("transfer_specific")) {
        Ok(model) => model,
        Err(e) => {
            warn!(allele = %allele, error = %e, "Skipping allele-specific transfer model");
            return Ok(None);
        }
    };

    let subset: Vec<usize> = tesla
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            normalize_allele(&r.allele) == allele
                && config.specific_lengths.contains(&r.peptide_length)
        })
        .map(|(i, _)| i)
        .collect();
    if subset.is_empty() {
        warn!(allele = %allele, "No TESLA records match the allele-specific model");
        return Ok(None);
    }

    let records: Vec<PeptideRecord> = subset.iter().map(|&i| tesla[i].clone()).collect();
    let y_subset: Vec<bool> = subset.iter().map(|&i| y_true[i]).collect();
    let scores = model.score_records(&records)?;
    let metrics = evaluator.evaluate(&format!("IEDB transfer ({allele})"), &y_subset, &scores)?;
    Ok(Some(TransferOutcome {
        allele: Some(allele),
        lengths: config.specific_lengths.clone(),
        n_train: model.n_train(),
        n_train_positive: model.n_positive(),
        metrics,
    }))
}

/// Attach transfer scores as the `iedb_score` column.
pub fn add_transfer_column(table: &mut FeatureTable, scores: Vec<f64>) -> Result<(), MlError> {
    table.add_column(TRANSFER_SCORE_COLUMN, scores)?;
    Ok(())
}
