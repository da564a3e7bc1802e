//! Position-aware feature engineering.
//!
//! A mutation at an MHC anchor mostly changes *binding*; a mutation at a
//! TCR-facing position mostly changes what the T-cell *sees*. The groups in
//! this module encode that split without structure prediction, using the
//! [`PositionModel`] tables plus per-residue properties.
//!
//! Every group is a fixed struct with an enumerated column list, and
//! [`FeatureRecord`] concatenates them in a fixed order. Invalid or missing
//! mutation positions never change the schema; they only turn the
//! mutation-dependent values into `NaN`.

pub mod global;
pub mod mutant;
pub mod position;
pub mod sequence;
pub mod site;

pub use global::{GlobalFeatures, TcrSurfaceFeatures};
pub use mutant::MutantSelfFeatures;
pub use position::PositionFeatures;
pub use sequence::{SequenceFeatures, sequence_features};
pub use site::{ContextFeatures, SiteProperties};

use crate::positions::{PositionModel, default_model};
use crate::record::PeptideRecord;
use serde::{Deserialize, Serialize};

/// Bumped whenever a column is added, removed, renamed or redefined.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// A fixed block of named numeric features.
pub trait FeatureGroup {
    /// Column names, in the same order as [`FeatureGroup::values`].
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<f64>;
}

/// A mutation position that has been checked against the peptide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationSite {
    /// 1-indexed position.
    pub position: usize,
    /// Residue symbol at that position.
    pub residue: char,
}

impl MutationSite {
    /// Resolve a raw 1-indexed position. `None` unless `1 <= pos <= length`
    /// and the sequence actually has a residue there.
    pub fn resolve(residues: &[char], position: Option<i64>, length: usize) -> Option<Self> {
        let pos = usize::try_from(position?).ok()?;
        if pos < 1 || pos > length {
            return None;
        }
        let residue = *residues.get(pos - 1)?;
        Some(Self {
            position: pos,
            residue,
        })
    }
}

/// All per-peptide features, one fixed schema for every input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub position: PositionFeatures,
    pub site: SiteProperties,
    pub context: ContextFeatures,
    pub global: GlobalFeatures,
    pub tcr_surface: TcrSurfaceFeatures,
    pub sequence: SequenceFeatures,
    pub mutant_self: MutantSelfFeatures,
}

impl FeatureRecord {
    /// Every column name, in record order.
    pub fn columns() -> Vec<&'static str> {
        [
            PositionFeatures::COLUMNS,
            SiteProperties::COLUMNS,
            ContextFeatures::COLUMNS,
            GlobalFeatures::COLUMNS,
            TcrSurfaceFeatures::COLUMNS,
            SequenceFeatures::COLUMNS,
            MutantSelfFeatures::COLUMNS,
        ]
        .concat()
    }

    /// Every value, aligned with [`FeatureRecord::columns`].
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(Self::columns().len());
        values.extend(self.position.values());
        values.extend(self.site.values());
        values.extend(self.context.values());
        values.extend(self.global.values());
        values.extend(self.tcr_surface.values());
        values.extend(self.sequence.values());
        values.extend(self.mutant_self.values());
        values
    }

    /// Named view of the record.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        Self::columns().into_iter().zip(self.values()).collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        Self::columns()
            .iter()
            .position(|c| *c == name)
            .map(|i| self.values()[i])
    }

    /// Exact equality including `NaN` payloads.
    pub fn bit_eq(&self, other: &Self) -> bool {
        let a = self.values();
        let b = other.values();
        a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits())
    }
}

/// Compute every feature group on the built-in position model.
///
/// `length` drives the positional rules (anchors, TCR contacts, normalization)
/// while residue lookups use the sequence itself.
pub fn compute_features(
    peptide: &str,
    mutation_position: Option<i64>,
    allele: &str,
    length: usize,
) -> FeatureRecord {
    compute_features_with(default_model(), peptide, mutation_position, allele, length)
}

/// [`compute_features`] with explicit position tables.
pub fn compute_features_with(
    model: &PositionModel,
    peptide: &str,
    mutation_position: Option<i64>,
    allele: &str,
    length: usize,
) -> FeatureRecord {
    let residues: Vec<char> = peptide.chars().collect();
    let site = MutationSite::resolve(&residues, mutation_position, length);

    FeatureRecord {
        position: PositionFeatures::compute(model, site, allele, length),
        site: SiteProperties::compute(site),
        context: ContextFeatures::compute(&residues, site),
        global: GlobalFeatures::compute(&residues),
        tcr_surface: TcrSurfaceFeatures::compute(model, &residues, length),
        sequence: SequenceFeatures::compute(&residues),
        mutant_self: MutantSelfFeatures::compute(site),
    }
}

/// Features for a loaded record.
pub fn features_for(record: &PeptideRecord, model: &PositionModel) -> FeatureRecord {
    compute_features_with(
        model,
        &record.peptide,
        record.mutation_position,
        &record.allele,
        record.peptide_length,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_columns_are_unique_and_aligned() {
        let columns = FeatureRecord::columns();
        let unique: HashSet<_> = columns.iter().collect();
        assert_eq!(unique.len(), columns.len());
        let record = compute_features("SIINFEKLV", Some(5), "HLA-A*02:01", 9);
        assert_eq!(record.values().len(), columns.len());
    }

    #[test]
    fn test_resolve_mutation_site() {
        let residues: Vec<char> = "ACDEF".chars().collect();
        assert_eq!(
            MutationSite::resolve(&residues, Some(1), 5),
            Some(MutationSite {
                position: 1,
                residue: 'A'
            })
        );
        assert!(MutationSite::resolve(&residues, Some(0), 5).is_none());
        assert!(MutationSite::resolve(&residues, Some(6), 5).is_none());
        assert!(MutationSite::resolve(&residues, Some(-3), 5).is_none());
        assert!(MutationSite::resolve(&residues, None, 5).is_none());
        // Declared length longer than the sequence.
        assert!(MutationSite::resolve(&residues, Some(6), 9).is_none());
    }

    #[test]
    fn test_missing_position_keeps_schema() {
        let with = compute_features("SIINFEKLV", Some(5), "HLA-A*02:01", 9);
        let without = compute_features("SIINFEKLV", None, "HLA-A*02:01", 9);
        let with_cols: Vec<_> = with.entries().into_iter().map(|(c, _)| c).collect();
        let without_cols: Vec<_> = without.entries().into_iter().map(|(c, _)| c).collect();
        assert_eq!(with_cols, without_cols);
        assert!(without.get("mut_at_anchor").unwrap().is_nan());
        assert!(without.get("mut_residue_hydrophobicity").unwrap().is_nan());
        assert!(without.get("mut_blosum_self").unwrap().is_nan());
        assert!(!without.get("peptide_hydrophobicity_mean").unwrap().is_nan());
    }

    #[test]
    fn test_recompute_is_bit_identical() {
        let a = compute_features("KLGGALQAK", Some(3), "HLA-A*03:01", 9);
        let b = compute_features("KLGGALQAK", Some(3), "HLA-A*03:01", 9);
        assert!(a.bit_eq(&b));
    }

    #[test]
    fn test_get_unknown_column() {
        let record = compute_features("SIINFEKLV", Some(5), "HLA-A*02:01", 9);
        assert!(record.get("no_such_feature").is_none());
    }
}
