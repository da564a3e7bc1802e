//! Sequence-composition features.
//!
//! These need no mutation position or allele, so they are the feature space
//! for models trained on one corpus and applied to another.

use super::FeatureGroup;
use crate::residue::{AminoAcid, Property, lookup};
use crate::stats::{histogram, mean, population_std, shannon_entropy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceFeatures {
    /// Fraction of each standard residue, in [`AminoAcid::ALL`] order.
    pub aa_frac: [f64; 20],
    pub hydro_mean: f64,
    pub hydro_std: f64,
    pub hydro_min: f64,
    pub hydro_max: f64,
    pub charge_sum: f64,
    /// Residues with `|charge| > 0.5`, so histidine does not count.
    pub n_charged: f64,
    pub n_aromatic: f64,
    pub frac_polar: f64,
    pub length: f64,
    pub dipeptide_entropy: f64,
    pub entropy: f64,
}

impl SequenceFeatures {
    pub fn compute(residues: &[char]) -> Self {
        let n = residues.len();
        let counts = histogram(residues.iter().copied());
        let ratio = |x: f64| if n == 0 { f64::NAN } else { x / n as f64 };

        let mut aa_frac = [0.0; 20];
        for (slot, aa) in aa_frac.iter_mut().zip(AminoAcid::ALL) {
            *slot = ratio(counts.get(&aa.as_char()).copied().unwrap_or(0) as f64);
        }

        let hydro: Vec<f64> = residues
            .iter()
            .map(|&r| lookup(r, Property::Hydrophobicity))
            .collect();
        let charge: Vec<f64> = residues
            .iter()
            .map(|&r| lookup(r, Property::Charge))
            .collect();

        let dipeptide_entropy = if n >= 2 {
            shannon_entropy(&histogram(residues.windows(2).map(|w| (w[0], w[1]))))
        } else {
            f64::NAN
        };

        Self {
            aa_frac,
            hydro_mean: mean(&hydro),
            hydro_std: population_std(&hydro),
            hydro_min: hydro.iter().copied().reduce(f64::min).unwrap_or(f64::NAN),
            hydro_max: hydro.iter().copied().reduce(f64::max).unwrap_or(f64::NAN),
            charge_sum: charge.iter().sum(),
            n_charged: charge.iter().filter(|c| c.abs() > 0.5).count() as f64,
            n_aromatic: residues.iter().map(|&r| lookup(r, Property::Aromatic)).sum(),
            frac_polar: ratio(residues.iter().map(|&r| lookup(r, Property::Polar)).sum()),
            length: n as f64,
            dipeptide_entropy,
            entropy: shannon_entropy(&counts),
        }
    }
}

impl FeatureGroup for SequenceFeatures {
    const COLUMNS: &'static [&'static str] = &[
        "aa_frac_A",
        "aa_frac_C",
        "aa_frac_D",
        "aa_frac_E",
        "aa_frac_F",
        "aa_frac_G",
        "aa_frac_H",
        "aa_frac_I",
        "aa_frac_K",
        "aa_frac_L",
        "aa_frac_M",
        "aa_frac_N",
        "aa_frac_P",
        "aa_frac_Q",
        "aa_frac_R",
        "aa_frac_S",
        "aa_frac_T",
        "aa_frac_V",
        "aa_frac_W",
        "aa_frac_Y",
        "seq_hydro_mean",
        "seq_hydro_std",
        "seq_hydro_min",
        "seq_hydro_max",
        "seq_charge_sum",
        "seq_n_charged",
        "seq_n_aromatic",
        "seq_frac_polar",
        "seq_length",
        "seq_dipeptide_entropy",
        "seq_entropy",
    ];

    fn values(&self) -> Vec<f64> {
        let mut values = self.aa_frac.to_vec();
        values.extend([
            self.hydro_mean,
            self.hydro_std,
            self.hydro_min,
            self.hydro_max,
            self.charge_sum,
            self.n_charged,
            self.n_aromatic,
            self.frac_polar,
            self.length,
            self.dipeptide_entropy,
            self.entropy,
        ]);
        values
    }
}

/// Sequence features for a bare peptide string.
pub fn sequence_features(peptide: &str) -> SequenceFeatures {
    let residues: Vec<char> = peptide.chars().collect();
    SequenceFeatures::compute(&residues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_fractions_sum_to_one() {
        let f = sequence_features("SIINFEKL");
        let total: f64 = f.aa_frac.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        // I is index 7 in alphabetical order.
        assert_eq!(f.aa_frac[7], 0.25);
        assert_eq!(f.length, 8.0);
    }

    #[test]
    fn test_unknown_symbols_reduce_composition_total() {
        let f = sequence_features("AXAX");
        assert_eq!(f.aa_frac[0], 0.5);
        assert_eq!(f.aa_frac.iter().sum::<f64>(), 0.5);
    }

    #[test]
    fn test_charge_counts_ignore_histidine() {
        let f = sequence_features("HKDH");
        assert_eq!(f.n_charged, 2.0);
        assert!((f.charge_sum - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_hydro_extremes() {
        let f = sequence_features("IRA");
        assert_eq!(f.hydro_min, -4.5);
        assert_eq!(f.hydro_max, 4.5);
    }

    #[test]
    fn test_dipeptide_entropy() {
        // AB, BA, AB: frequencies 2/3 and 1/3.
        let f = sequence_features("ABAB");
        let expected = -(2.0 / 3.0f64 * (2.0 / 3.0f64).log2() + 1.0 / 3.0f64 * (1.0 / 3.0f64).log2());
        assert!((f.dipeptide_entropy - expected).abs() < 1e-8);
        assert!(sequence_features("A").dipeptide_entropy.is_nan());
    }

    #[test]
    fn test_empty_sequence() {
        let f = sequence_features("");
        assert!(f.aa_frac.iter().all(|v| v.is_nan()));
        assert!(f.hydro_mean.is_nan());
        assert!(f.hydro_min.is_nan());
        assert!(f.frac_polar.is_nan());
        assert!(f.entropy.is_nan());
        assert_eq!(f.length, 0.0);
        assert_eq!(f.n_charged, 0.0);
        assert_eq!(f.charge_sum, 0.0);
    }

    #[test]
    fn test_columns_match_values() {
        assert_eq!(SequenceFeatures::COLUMNS.len(), sequence_features("ACD").values().len());
    }
}
