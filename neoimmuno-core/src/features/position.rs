//! Position-class features: where in the groove the mutation sits.

use super::{FeatureGroup, MutationSite};
use crate::positions::PositionModel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFeatures {
    pub mut_at_anchor: f64,
    pub mut_at_tcr_contact: f64,
    pub mut_at_p2: f64,
    pub mut_at_cterm: f64,
    /// 0 at the N-terminus, 1 at the C-terminus.
    pub mut_position_normalized: f64,
    /// Distance from the peptide center relative to the center itself.
    pub mut_distance_from_center: f64,
}

fn flag(condition: bool) -> f64 {
    if condition { 1.0 } else { 0.0 }
}

impl PositionFeatures {
    pub fn missing() -> Self {
        Self {
            mut_at_anchor: f64::NAN,
            mut_at_tcr_contact: f64::NAN,
            mut_at_p2: f64::NAN,
            mut_at_cterm: f64::NAN,
            mut_position_normalized: f64::NAN,
            mut_distance_from_center: f64::NAN,
        }
    }

    pub fn compute(
        model: &PositionModel,
        site: Option<MutationSite>,
        allele: &str,
        length: usize,
    ) -> Self {
        let Some(site) = site else {
            return Self::missing();
        };
        let pos = site.position;
        let anchors = model.anchors_for(allele, length);
        let contacts = model.tcr_contacts_for(length);

        let center = (length as f64 + 1.0) / 2.0;
        Self {
            mut_at_anchor: flag(anchors.contains(&pos)),
            mut_at_tcr_contact: flag(contacts.contains(&pos)),
            mut_at_p2: flag(pos == 2),
            mut_at_cterm: flag(pos == length),
            mut_position_normalized: (pos - 1) as f64 / length.saturating_sub(1).max(1) as f64,
            mut_distance_from_center: (pos as f64 - center).abs() / center,
        }
    }
}

impl FeatureGroup for PositionFeatures {
    const COLUMNS: &'static [&'static str] = &[
        "mut_at_anchor",
        "mut_at_tcr_contact",
        "mut_at_p2",
        "mut_at_cterm",
        "mut_position_normalized",
        "mut_distance_from_center",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.mut_at_anchor,
            self.mut_at_tcr_contact,
            self.mut_at_p2,
            self.mut_at_cterm,
            self.mut_position_normalized,
            self.mut_distance_from_center,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::default_model;

    fn site(position: usize) -> Option<MutationSite> {
        Some(MutationSite {
            position,
            residue: 'A',
        })
    }

    #[test]
    fn test_anchor_p2() {
        let f = PositionFeatures::compute(default_model(), site(2), "HLA-A*02:01", 9);
        assert_eq!(f.mut_at_anchor, 1.0);
        assert_eq!(f.mut_at_tcr_contact, 0.0);
        assert_eq!(f.mut_at_p2, 1.0);
        assert_eq!(f.mut_at_cterm, 0.0);
        assert_eq!(f.mut_position_normalized, 0.125);
        assert!((f.mut_distance_from_center - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_center_tcr_contact() {
        let f = PositionFeatures::compute(default_model(), site(5), "HLA-A*02:01", 9);
        assert_eq!(f.mut_at_anchor, 0.0);
        assert_eq!(f.mut_at_tcr_contact, 1.0);
        assert_eq!(f.mut_position_normalized, 0.5);
        assert_eq!(f.mut_distance_from_center, 0.0);
    }

    #[test]
    fn test_cterm_of_10mer_is_anchor() {
        let f = PositionFeatures::compute(default_model(), site(10), "HLA-A*02:01", 10);
        assert_eq!(f.mut_at_anchor, 1.0);
        assert_eq!(f.mut_at_cterm, 1.0);
        assert_eq!(f.mut_position_normalized, 1.0);
    }

    #[test]
    fn test_length_one_normalization() {
        let f = PositionFeatures::compute(default_model(), site(1), "HLA-A*02:01", 1);
        assert_eq!(f.mut_position_normalized, 0.0);
        assert_eq!(f.mut_distance_from_center, 0.0);
        assert_eq!(f.mut_at_tcr_contact, 0.0);
    }

    #[test]
    fn test_missing_is_all_nan() {
        let f = PositionFeatures::compute(default_model(), None, "HLA-A*02:01", 9);
        assert!(f.values().iter().all(|v| v.is_nan()));
    }
}
