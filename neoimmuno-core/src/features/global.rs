//! Whole-peptide descriptors and the TCR-facing surface.

use super::FeatureGroup;
use crate::positions::PositionModel;
use crate::residue::{Property, lookup};
use crate::stats::{histogram, mean, population_std, shannon_entropy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalFeatures {
    pub hydrophobicity_mean: f64,
    pub hydrophobicity_std: f64,
    pub net_charge: f64,
    pub has_positive_charge: f64,
    pub has_negative_charge: f64,
    pub n_aromatic: f64,
    pub frac_polar: f64,
    pub sequence_entropy: f64,
}

impl GlobalFeatures {
    pub fn compute(residues: &[char]) -> Self {
        let hydro: Vec<f64> = residues
            .iter()
            .map(|&r| lookup(r, Property::Hydrophobicity))
            .collect();
        let charge: Vec<f64> = residues
            .iter()
            .map(|&r| lookup(r, Property::Charge))
            .collect();
        let n_polar: f64 = residues.iter().map(|&r| lookup(r, Property::Polar)).sum();

        Self {
            hydrophobicity_mean: mean(&hydro),
            hydrophobicity_std: population_std(&hydro),
            net_charge: charge.iter().sum(),
            has_positive_charge: if charge.iter().any(|&c| c > 0.0) { 1.0 } else { 0.0 },
            has_negative_charge: if charge.iter().any(|&c| c < 0.0) { 1.0 } else { 0.0 },
            n_aromatic: residues.iter().map(|&r| lookup(r, Property::Aromatic)).sum(),
            frac_polar: if residues.is_empty() {
                f64::NAN
            } else {
                n_polar / residues.len() as f64
            },
            sequence_entropy: shannon_entropy(&histogram(residues.iter().copied())),
        }
    }
}

impl FeatureGroup for GlobalFeatures {
    const COLUMNS: &'static [&'static str] = &[
        "peptide_hydrophobicity_mean",
        "peptide_hydrophobicity_std",
        "peptide_net_charge",
        "peptide_has_positive_charge",
        "peptide_has_negative_charge",
        "peptide_n_aromatic",
        "peptide_frac_polar",
        "peptide_sequence_entropy",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.hydrophobicity_mean,
            self.hydrophobicity_std,
            self.net_charge,
            self.has_positive_charge,
            self.has_negative_charge,
            self.n_aromatic,
            self.frac_polar,
            self.sequence_entropy,
        ]
    }
}

/// Properties of the residues the T-cell receptor actually contacts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TcrSurfaceFeatures {
    pub hydrophobicity: f64,
    pub charge: f64,
    pub n_aromatic: f64,
    pub frac_polar: f64,
}

impl TcrSurfaceFeatures {
    /// Contact positions come from `length`; positions past the end of the
    /// sequence are skipped. With no surviving residue every value is `NaN`.
    pub fn compute(model: &PositionModel, residues: &[char], length: usize) -> Self {
        let surface: Vec<char> = model
            .tcr_contacts_for(length)
            .into_iter()
            .filter_map(|pos| residues.get(pos.checked_sub(1)?).copied())
            .collect();

        if surface.is_empty() {
            return Self {
                hydrophobicity: f64::NAN,
                charge: f64::NAN,
                n_aromatic: f64::NAN,
                frac_polar: f64::NAN,
            };
        }

        let sum = |p: Property| surface.iter().map(|&r| lookup(r, p)).sum::<f64>();
        let n = surface.len() as f64;
        Self {
            hydrophobicity: sum(Property::Hydrophobicity) / n,
            charge: sum(Property::Charge),
            n_aromatic: sum(Property::Aromatic),
            frac_polar: sum(Property::Polar) / n,
        }
    }
}

impl FeatureGroup for TcrSurfaceFeatures {
    const COLUMNS: &'static [&'static str] = &[
        "tcr_surface_hydrophobicity",
        "tcr_surface_charge",
        "tcr_surface_n_aromatic",
        "tcr_surface_frac_polar",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.hydrophobicity,
            self.charge,
            self.n_aromatic,
            self.frac_polar,
        ]
    }
}
