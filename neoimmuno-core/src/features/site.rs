//! Properties of the mutant residue and of its immediate neighbours.

use super::{FeatureGroup, MutationSite};
use crate::residue::{Property, lookup};
use serde::{Deserialize, Serialize};

/// Physicochemical properties of the residue at the mutation site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteProperties {
    pub hydrophobicity: f64,
    pub molecular_weight: f64,
    pub charge: f64,
    pub aromatic: f64,
    pub polar: f64,
}

impl SiteProperties {
    pub fn compute(site: Option<MutationSite>) -> Self {
        match site {
            Some(site) => {
                let r = site.residue;
                Self {
                    hydrophobicity: lookup(r, Property::Hydrophobicity),
                    molecular_weight: lookup(r, Property::MolecularWeight),
                    charge: lookup(r, Property::Charge),
                    aromatic: lookup(r, Property::Aromatic),
                    polar: lookup(r, Property::Polar),
                }
            }
            None => Self {
                hydrophobicity: f64::NAN,
                molecular_weight: f64::NAN,
                charge: f64::NAN,
                aromatic: f64::NAN,
                polar: f64::NAN,
            },
        }
    }
}

impl FeatureGroup for SiteProperties {
    const COLUMNS: &'static [&'static str] = &[
        "mut_residue_hydrophobicity",
        "mut_residue_molecular_weight",
        "mut_residue_charge",
        "mut_residue_aromatic",
        "mut_residue_polar",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.hydrophobicity,
            self.molecular_weight,
            self.charge,
            self.aromatic,
            self.polar,
        ]
    }
}

/// How the mutant residue compares with its ±1 flanks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextFeatures {
    /// Mean flank hydrophobicity, `0.0` for a single-residue peptide.
    pub context_hydrophobicity_mean: f64,
    pub context_charge_sum: f64,
    pub mut_hydrophobicity_vs_context: f64,
    pub mut_creates_charge_break: f64,
}

impl ContextFeatures {
    pub fn compute(residues: &[char], site: Option<MutationSite>) -> Self {
        let Some(site) = site else {
            return Self {
                context_hydrophobicity_mean: f64::NAN,
                context_charge_sum: f64::NAN,
                mut_hydrophobicity_vs_context: f64::NAN,
                mut_creates_charge_break: f64::NAN,
            };
        };

        let idx = site.position - 1;
        let mut flanks = Vec::with_capacity(2);
        if idx > 0 {
            flanks.push(residues[idx - 1]);
        }
        if let Some(&next) = residues.get(idx + 1) {
            flanks.push(next);
        }

        let context_hydro = if flanks.is_empty() {
            0.0
        } else {
            flanks
                .iter()
                .map(|&r| lookup(r, Property::Hydrophobicity))
                .sum::<f64>()
                / flanks.len() as f64
        };
        let context_charge: f64 = flanks.iter().map(|&r| lookup(r, Property::Charge)).sum();

        let mut_hydro = lookup(site.residue, Property::Hydrophobicity);
        let mut_charge = lookup(site.residue, Property::Charge);

        Self {
            context_hydrophobicity_mean: context_hydro,
            context_charge_sum: context_charge,
            mut_hydrophobicity_vs_context: mut_hydro - context_hydro,
            mut_creates_charge_break: (mut_charge - context_charge / flanks.len().max(1) as f64)
                .abs(),
        }
    }
}

impl FeatureGroup for ContextFeatures {
    const COLUMNS: &'static [&'static str] = &[
        "context_hydrophobicity_mean",
        "context_charge_sum",
        "mut_hydrophobicity_vs_context",
        "mut_creates_charge_break",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.context_hydrophobicity_mean,
            self.context_charge_sum,
            self.mut_hydrophobicity_vs_context,
            self.mut_creates_charge_break,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(peptide: &str, pos: i64) -> (Vec<char>, Option<MutationSite>) {
        let residues: Vec<char> = peptide.chars().collect();
        let site = MutationSite::resolve(&residues, Some(pos), residues.len());
        (residues, site)
    }

    #[test]
    fn test_site_properties_for_lysine() {
        let (_, site) = resolve("AAKAA", 3);
        let props = SiteProperties::compute(site);
        assert_eq!(props.hydrophobicity, -3.9);
        assert_eq!(props.molecular_weight, 146.0);
        assert_eq!(props.charge, 1.0);
        assert_eq!(props.aromatic, 0.0);
        assert_eq!(props.polar, 1.0);
    }

    #[test]
    fn test_context_interior_residue() {
        // Flanks are I (4.5, 0) and D (-3.5, -1); mutant is K (-3.9, +1).
        let (residues, site) = resolve("AIKDA", 3);
        let ctx = ContextFeatures::compute(&residues, site);
        assert!((ctx.context_hydrophobicity_mean - 0.5).abs() < 1e-12);
        assert_eq!(ctx.context_charge_sum, -1.0);
        assert!((ctx.mut_hydrophobicity_vs_context - (-4.4)).abs() < 1e-12);
        assert!((ctx.mut_creates_charge_break - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_context_terminal_residue_has_one_flank() {
        let (residues, site) = resolve("KIAAA", 1);
        let ctx = ContextFeatures::compute(&residues, site);
        assert_eq!(ctx.context_hydrophobicity_mean, 4.5);
        assert_eq!(ctx.mut_creates_charge_break, 1.0);
    }

    #[test]
    fn test_context_single_residue() {
        let (residues, site) = resolve("K", 1);
        let ctx = ContextFeatures::compute(&residues, site);
        assert_eq!(ctx.context_hydrophobicity_mean, 0.0);
        assert_eq!(ctx.context_charge_sum, 0.0);
        assert_eq!(ctx.mut_hydrophobicity_vs_context, -3.9);
        assert_eq!(ctx.mut_creates_charge_break, 1.0);
    }

    #[test]
    fn test_unknown_site_residue_uses_defaults() {
        let (residues, site) = resolve("AAXAA", 3);
        assert_eq!(SiteProperties::compute(site).hydrophobicity, 0.0);
        let ctx = ContextFeatures::compute(&residues, site);
        assert_eq!(ctx.mut_hydrophobicity_vs_context, -1.8);
    }
}
