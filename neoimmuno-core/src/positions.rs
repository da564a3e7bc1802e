//! MHC anchor and TCR-contact position model.
//!
//! MHC class I peptides sit in the groove with a few side chains buried
//! (anchors, classically P2 and the C-terminus) while the central residues
//! point up towards the T-cell receptor. The tables here are heuristics from
//! published binding motifs, so they are exposed as a configurable
//! [`PositionModel`] whose `Default` is the built-in table.
//!
//! All positions are 1-indexed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Anchor and TCR-contact tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionModel {
    /// Anchor positions for 9-mers, keyed by canonical allele name.
    #[serde(default = "default_anchor_table")]
    pub anchors_9mer: BTreeMap<String, Vec<usize>>,
    /// Anchors used for alleles missing from `anchors_9mer`.
    #[serde(default = "default_fallback_anchors")]
    pub fallback_anchors: Vec<usize>,
    /// TCR-facing positions for peptides of length 9 or shorter.
    #[serde(default = "default_tcr_9mer")]
    pub tcr_contacts_9mer: Vec<usize>,
    /// TCR-facing positions for 10-mers.
    #[serde(default = "default_tcr_10mer")]
    pub tcr_contacts_10mer: Vec<usize>,
    /// TCR-facing positions for peptides of length 11 or longer.
    #[serde(default = "default_tcr_11mer")]
    pub tcr_contacts_11mer: Vec<usize>,
}

impl Default for PositionModel {
    fn default() -> Self {
        Self {
            anchors_9mer: default_anchor_table(),
            fallback_anchors: default_fallback_anchors(),
            tcr_contacts_9mer: default_tcr_9mer(),
            tcr_contacts_10mer: default_tcr_10mer(),
            tcr_contacts_11mer: default_tcr_11mer(),
        }
    }
}

fn default_anchor_table() -> BTreeMap<String, Vec<usize>> {
    [
        ("HLA-A*01:01", vec![2, 3, 9]),
        ("HLA-A*02:01", vec![2, 9]),
        ("HLA-A*03:01", vec![2, 9]),
        ("HLA-A*11:01", vec![2, 9]),
        ("HLA-A*24:02", vec![2, 9]),
        ("HLA-A*68:01", vec![2, 9]),
        ("HLA-B*07:02", vec![2, 9]),
        // B8 anchors on P3 and P5 rather than P2.
        ("HLA-B*08:01", vec![3, 5, 9]),
        ("HLA-B*27:05", vec![2, 9]),
        ("HLA-B*44:02", vec![2, 9]),
        ("HLA-B*57:01", vec![2, 9]),
        ("HLA-C*05:01", vec![2, 9]),
        ("HLA-C*06:02", vec![2, 9]),
    ]
    .into_iter()
    .map(|(allele, anchors)| (allele.to_string(), anchors))
    .collect()
}

fn default_fallback_anchors() -> Vec<usize> {
    vec![2, 9]
}

fn default_tcr_9mer() -> Vec<usize> {
    vec![4, 5, 6, 7, 8]
}

fn default_tcr_10mer() -> Vec<usize> {
    vec![4, 5, 6, 7, 8, 9]
}

fn default_tcr_11mer() -> Vec<usize> {
    vec![4, 5, 6, 7, 8, 9, 10]
}

impl PositionModel {
    /// Whether `allele` has an explicit entry (otherwise the fallback applies).
    pub fn knows_allele(&self, allele: &str) -> bool {
        self.anchors_9mer.contains_key(allele)
    }

    /// Anchor positions for `allele` at `length`.
    ///
    /// Longer-than-9 peptides keep their N-terminal anchors but the C-terminal
    /// anchor moves from 9 to `length`.
    pub fn anchors_for(&self, allele: &str, length: usize) -> Vec<usize> {
        let base = self
            .anchors_9mer
            .get(allele)
            .unwrap_or(&self.fallback_anchors);
        if length > 9 {
            let mut anchors: Vec<usize> = base.iter().copied().filter(|&p| p != 9).collect();
            anchors.push(length);
            anchors
        } else {
            base.clone()
        }
    }

    /// TCR-facing positions for `length`, capped at `length - 2` entries.
    pub fn tcr_contacts_for(&self, length: usize) -> Vec<usize> {
        let table = match length {
            0..=9 => &self.tcr_contacts_9mer,
            10 => &self.tcr_contacts_10mer,
            _ => &self.tcr_contacts_11mer,
        };
        table
            .iter()
            .copied()
            .take(length.saturating_sub(2))
            .collect()
    }
}

static DEFAULT_MODEL: LazyLock<PositionModel> = LazyLock::new(PositionModel::default);

/// The built-in position model.
pub fn default_model() -> &'static PositionModel {
    &DEFAULT_MODEL
}

/// [`PositionModel::anchors_for`] on the built-in tables.
pub fn anchors_for(allele: &str, length: usize) -> Vec<usize> {
    DEFAULT_MODEL.anchors_for(allele, length)
}

/// [`PositionModel::tcr_contacts_for`] on the built-in tables.
pub fn tcr_contacts_for(length: usize) -> Vec<usize> {
    DEFAULT_MODEL.tcr_contacts_for(length)
}
