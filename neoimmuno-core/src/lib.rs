//! # neoimmuno-core — peptide features for neoantigen immunogenicity
//!
//! Pure, deterministic building blocks shared by the evaluation crate and the CLI:
//!
//! 1. **Residue tables**: static per-residue physicochemical lookups
//! 2. **Position model**: MHC anchor and TCR-facing positions per allele and length
//! 3. **Feature engineering**: fixed-schema feature records per peptide
//! 4. **Data**: TESLA and IEDB table loaders, column-oriented feature tables
//!
//! Nothing in this crate performs randomness or hidden I/O: the same
//! [`PeptideRecord`] always yields a bit-identical [`FeatureRecord`].

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod positions;
pub mod record;
pub mod residue;
pub mod stats;

// Re-exports
pub use config::DataConfig;
pub use error::CoreError;
pub use features::{FEATURE_SCHEMA_VERSION, FeatureRecord, compute_features, features_for};
pub use positions::{PositionModel, anchors_for, tcr_contacts_for};
pub use record::{Allele, Covariates, PeptideRecord};
pub use residue::{AminoAcid, Property, lookup};
