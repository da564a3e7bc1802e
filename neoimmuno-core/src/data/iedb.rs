//! IEDB T-cell assay corpus: loading, filtering and de-duplication.
//!
//! The pre-filtered export has five positional columns:
//! `peptide, allele, qualitative, immunogenic, peptide_length`. Header names
//! in the file are ignored.

use super::{field, parse_bool, parse_i64};
use crate::error::CoreError;
use crate::record::PeptideRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::info;

/// Allele labels too coarse to train an allele-aware model on.
pub const GENERIC_ALLELES: [&str; 4] = ["HLA class I", "HLA class II", "HLA-A2", "HLA-B7"];

/// One assay row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IedbRecord {
    pub peptide: String,
    pub allele: String,
    /// Raw qualitative outcome, e.g. `Positive-High`.
    pub qualitative: String,
    pub immunogenic: bool,
    pub peptide_length: usize,
}

/// How to resolve conflicting assays for the same (peptide, allele) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Positive when strictly more than half of the assays are positive.
    #[default]
    Majority,
    /// Positive when any assay is positive.
    AnyPositive,
    /// Positive only when every assay is positive.
    StrictPositive,
}

impl DedupStrategy {
    fn resolve(self, n_positive: usize, n_assays: usize) -> bool {
        match self {
            Self::Majority => n_positive as f64 / n_assays as f64 > 0.5,
            Self::AnyPositive => n_positive > 0,
            Self::StrictPositive => n_positive == n_assays,
        }
    }
}

/// One de-duplicated (peptide, allele) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IedbPair {
    pub peptide: String,
    pub allele: String,
    pub immunogenic: bool,
    pub n_assays: usize,
    pub n_positive: usize,
    pub peptide_length: usize,
}

impl IedbPair {
    /// A labelled record with no mutation position and no group.
    pub fn to_record(&self) -> PeptideRecord {
        PeptideRecord::new(self.peptide.clone(), self.allele.clone()).with_label(self.immunogenic)
    }
}

/// Row filters applied before de-duplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IedbFilter {
    /// Keep only this allele.
    #[serde(default)]
    pub allele: Option<String>,
    /// Keep only these peptide lengths.
    #[serde(default)]
    pub lengths: Option<Vec<usize>>,
}

impl IedbFilter {
    pub fn keeps(&self, record: &IedbRecord) -> bool {
        if GENERIC_ALLELES.contains(&record.allele.as_str()) {
            return false;
        }
        if let Some(allele) = &self.allele {
            if &record.allele != allele {
                return false;
            }
        }
        if let Some(lengths) = &self.lengths {
            if !lengths.contains(&record.peptide_length) {
                return false;
            }
        }
        true
    }
}

pub fn load_iedb(path: &Path) -> Result<Vec<IedbRecord>, CoreError> {
    let file = std::fs::File::open(path)?;
    let records = read_iedb(file)?;
    info!(path = %path.display(), records = records.len(), "Loaded IEDB assays");
    Ok(records)
}

pub fn read_iedb<R: io::Read>(reader: R) -> Result<Vec<IedbRecord>, CoreError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let width = csv_reader.headers()?.len();
    if width < 5 {
        return Err(CoreError::schema(format!(
            "IEDB table needs 5 columns (peptide, allele, qualitative, immunogenic, peptide_length), found {width}"
        )));
    }

    let mut records = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let raw = result?;
        let immunogenic = parse_bool(field(&raw, 3), row, "immunogenic")?
            .ok_or_else(|| CoreError::invalid_value(row, "immunogenic", "missing label"))?;
        let peptide_length = parse_i64(field(&raw, 4), row, "peptide_length")?
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| CoreError::invalid_value(row, "peptide_length", "missing length"))?;

        records.push(IedbRecord {
            peptide: field(&raw, 0).trim().to_string(),
            allele: field(&raw, 1).trim().to_string(),
            qualitative: field(&raw, 2).trim().to_string(),
            immunogenic,
            peptide_length,
        });
    }
    Ok(records)
}

/// Filter, then collapse duplicates. Output is sorted by (peptide, allele).
pub fn prepare_training_pairs(
    records: &[IedbRecord],
    filter: &IedbFilter,
    strategy: DedupStrategy,
) -> Vec<IedbPair> {
    let mut groups: BTreeMap<(&str, &str), (usize, usize, usize)> = BTreeMap::new();
    for record in records.iter().filter(|r| filter.keeps(r)) {
        let entry = groups
            .entry((record.peptide.as_str(), record.allele.as_str()))
            .or_insert((0, 0, record.peptide_length));
        entry.0 += 1;
        entry.1 += usize::from(record.immunogenic);
    }

    let pairs: Vec<IedbPair> = groups
        .into_iter()
        .map(|((peptide, allele), (n_assays, n_positive, peptide_length))| IedbPair {
            peptide: peptide.to_string(),
            allele: allele.to_string(),
            immunogenic: strategy.resolve(n_positive, n_assays),
            n_assays,
            n_positive,
            peptide_length,
        })
        .collect();

    info!(
        pairs = pairs.len(),
        positives = pairs.iter().filter(|p| p.immunogenic).count(),
        strategy = ?strategy,
        "Prepared IEDB training pairs"
    );
    pairs
}
