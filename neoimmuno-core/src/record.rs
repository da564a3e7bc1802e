//! Peptide records and HLA allele identifiers.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical HLA class I allele, `HLA-<gene>*<group>:<protein>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Allele {
    pub gene: String,
    pub group: String,
    pub protein: String,
}

impl Allele {
    /// Parse the canonical form. The `HLA-` prefix is required.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let malformed = || CoreError::MalformedAllele(raw.to_string());
        let rest = raw.trim().strip_prefix("HLA-").ok_or_else(malformed)?;
        let (gene, fields) = rest.split_once('*').ok_or_else(malformed)?;
        let (group, protein) = fields.split_once(':').ok_or_else(malformed)?;

        let gene_ok = !gene.is_empty() && gene.chars().all(|c| c.is_ascii_alphanumeric());
        let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if !gene_ok || !digits(group) || !digits(protein) {
            return Err(malformed());
        }

        Ok(Self {
            gene: gene.to_string(),
            group: group.to_string(),
            protein: protein.to_string(),
        })
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HLA-{}*{}:{}", self.gene, self.group, self.protein)
    }
}

/// Add the `HLA-` prefix used by IEDB and MHC predictors if it is missing.
///
/// TESLA ships alleles as `A*02:01`.
pub fn normalize_allele(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("HLA-") {
        trimmed.to_string()
    } else {
        format!("HLA-{trimmed}")
    }
}

/// Opaque numeric covariates precomputed by the TESLA consortium.
///
/// Missing values are `NaN`; downstream imputation handles them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariates {
    /// NetMHCpan predicted binding affinity (nM).
    pub predicted_affinity: f64,
    /// Measured binding affinity (nM).
    pub binding_affinity: f64,
    /// pMHC binding stability (hours).
    pub binding_stability: f64,
    /// Tumor RNA abundance (TPM).
    pub tumor_abundance: f64,
    pub frac_hydrophobic: f64,
    /// Mutant/wild-type binding ratio.
    pub agretopicity: f64,
    pub foreignness: f64,
}

impl Default for Covariates {
    fn default() -> Self {
        Self {
            predicted_affinity: f64::NAN,
            binding_affinity: f64::NAN,
            binding_stability: f64::NAN,
            tumor_abundance: f64::NAN,
            frac_hydrophobic: f64::NAN,
            agretopicity: f64::NAN,
            foreignness: f64::NAN,
        }
    }
}

impl Covariates {
    pub const COLUMNS: [&'static str; 7] = [
        "predicted_affinity",
        "binding_affinity",
        "binding_stability",
        "tumor_abundance",
        "frac_hydrophobic",
        "agretopicity",
        "foreignness",
    ];

    pub fn values(&self) -> [f64; 7] {
        [
            self.predicted_affinity,
            self.binding_affinity,
            self.binding_stability,
            self.tumor_abundance,
            self.frac_hydrophobic,
            self.agretopicity,
            self.foreignness,
        ]
    }
}

/// One candidate neoantigen peptide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideRecord {
    pub peptide: String,
    pub allele: String,
    pub peptide_length: usize,
    /// 1-indexed mutation position. Out-of-range values are kept as given and
    /// resolved to `NaN` features later.
    pub mutation_position: Option<i64>,
    pub immunogenic: Option<bool>,
    /// Grouping key (patient id) used to keep related peptides in one fold.
    pub patient_id: Option<String>,
    #[serde(default)]
    pub covariates: Covariates,
}

impl PeptideRecord {
    /// Create a record whose length is derived from the sequence.
    pub fn new(peptide: impl Into<String>, allele: impl Into<String>) -> Self {
        let peptide = peptide.into();
        let peptide_length = peptide.chars().count();
        Self {
            peptide,
            allele: allele.into(),
            peptide_length,
            mutation_position: None,
            immunogenic: None,
            patient_id: None,
            covariates: Covariates::default(),
        }
    }

    pub fn with_mutation_position(mut self, position: Option<i64>) -> Self {
        self.mutation_position = position;
        self
    }

    pub fn with_label(mut self, immunogenic: bool) -> Self {
        self.immunogenic = Some(immunogenic);
        self
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_covariates(mut self, covariates: Covariates) -> Self {
        self.covariates = covariates;
        self
    }

    /// Set a declared length, rejecting one that disagrees with the sequence.
    pub fn with_length(mut self, length: usize) -> Result<Self, CoreError> {
        let actual = self.peptide.chars().count();
        if length != actual {
            return Err(CoreError::schema(format!(
                "peptide '{}' declares length {length} but has {actual} residues",
                self.peptide
            )));
        }
        self.peptide_length = length;
        Ok(self)
    }
}
