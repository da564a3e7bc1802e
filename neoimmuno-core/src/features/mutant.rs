//! Mutant-vs-self descriptors.
//!
//! The wild-type residue is not known, so these describe how unusual the
//! mutant residue is on its own: substitution self-score, proteome rarity and
//! normalized physicochemistry.

use super::{FeatureGroup, MutationSite};
use crate::residue::{Property, lookup};
use serde::{Deserialize, Serialize};

/// Molecular weight divisor that brings residue size into roughly `[0.4, 1]`.
const SIZE_SCALE: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutantSelfFeatures {
    pub blosum_self: f64,
    /// `-ln(background frequency)`.
    pub aa_rarity: f64,
    pub hydro: f64,
    pub charge: f64,
    pub size: f64,
    pub aromatic: f64,
    pub polar: f64,
}

impl MutantSelfFeatures {
    pub fn compute(site: Option<MutationSite>) -> Self {
        let Some(MutationSite { residue: r, .. }) = site else {
            return Self {
                blosum_self: f64::NAN,
                aa_rarity: f64::NAN,
                hydro: f64::NAN,
                charge: f64::NAN,
                size: f64::NAN,
                aromatic: f64::NAN,
                polar: f64::NAN,
            };
        };

        Self {
            blosum_self: lookup(r, Property::BlosumSelf),
            aa_rarity: -lookup(r, Property::BackgroundFrequency).ln(),
            hydro: lookup(r, Property::Hydrophobicity),
            charge: lookup(r, Property::Charge),
            size: lookup(r, Property::MolecularWeight) / SIZE_SCALE,
            aromatic: lookup(r, Property::Aromatic),
            polar: lookup(r, Property::Polar),
        }
    }
}

impl FeatureGroup for MutantSelfFeatures {
    const COLUMNS: &'static [&'static str] = &[
        "mut_blosum_self",
        "mut_aa_rarity",
        "mut_self_hydro",
        "mut_self_charge",
        "mut_self_size",
        "mut_self_aromatic",
        "mut_self_polar",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.blosum_self,
            self.aa_rarity,
            self.hydro,
            self.charge,
            self.size,
            self.aromatic,
            self.polar,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(residue: char) -> Option<MutationSite> {
        Some(MutationSite {
            position: 1,
            residue,
        })
    }

    #[test]
    fn test_tryptophan_is_rare_and_large() {
        let f = MutantSelfFeatures::compute(at('W'));
        assert_eq!(f.blosum_self, 11.0);
        assert!((f.aa_rarity - (-(0.013f64).ln())).abs() < 1e-12);
        assert!((f.size - 1.02).abs() < 1e-12);
        assert_eq!(f.aromatic, 1.0);
    }

    #[test]
    fn test_unknown_residue_defaults() {
        let f = MutantSelfFeatures::compute(at('X'));
        assert_eq!(f.blosum_self, 4.0);
        assert!((f.aa_rarity - (-(0.01f64).ln())).abs() < 1e-12);
        assert_eq!(f.size, 0.0);
    }

    #[test]
    fn test_missing_site() {
        let f = MutantSelfFeatures::compute(None);
        assert!(f.values().iter().all(|v| v.is_nan()));
    }
}
