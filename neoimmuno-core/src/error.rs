//! Error types for the neoimmuno-core crate.

use thiserror::Error;

/// Top-level error type for record, table and loader operations.
///
/// Only input-shape contract violations surface here. Recoverable conditions
/// (bad mutation positions, unknown alleles, odd residues) degrade to `NaN`
/// features instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid value in row {row}, column '{column}': {message}")]
    InvalidValue {
        row: usize,
        column: String,
        message: String,
    },

    #[error("Malformed allele: {0}")]
    MalformedAllele(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CoreError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn(name.into())
    }

    pub fn invalid_value(row: usize, column: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            row,
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
