//! Tabular inputs and outputs.
//!
//! Loaders are deliberately thin: they map column names, parse nullable
//! values and enforce the handful of contract checks that make the rest of
//! the pipeline safe (required columns present, lengths consistent).

pub mod iedb;
pub mod table;
pub mod tesla;

pub use iedb::{
    DedupStrategy, GENERIC_ALLELES, IedbFilter, IedbPair, IedbRecord, load_iedb, prepare_training_pairs,
    read_iedb,
};
pub use table::FeatureTable;
pub use tesla::{load_tesla, read_tesla};

use crate::error::CoreError;
use csv::StringRecord;
use std::collections::HashMap;

/// Tokens treated as missing in nullable columns.
const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "NULL", "null", "None"];

pub fn is_null(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw.trim())
}

/// Parse a nullable float. Missing values become `NaN`.
pub fn parse_f64(raw: &str, row: usize, column: &str) -> Result<f64, CoreError> {
    if is_null(raw) {
        return Ok(f64::NAN);
    }
    raw.trim()
        .parse::<f64>()
        .map_err(|e| CoreError::invalid_value(row, column, e.to_string()))
}

/// Parse a nullable integer. Spreadsheet exports often write `9.0`, which is
/// accepted as long as there is no fractional part.
pub fn parse_i64(raw: &str, row: usize, column: &str) -> Result<Option<i64>, CoreError> {
    if is_null(raw) {
        return Ok(None);
    }
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(Some(v));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(Some(v as i64)),
        _ => Err(CoreError::invalid_value(
            row,
            column,
            format!("expected an integer, got '{trimmed}'"),
        )),
    }
}

/// Parse a boolean label (`True/False`, `1/0`, `yes/no`, `Positive/Negative`).
pub fn parse_bool(raw: &str, row: usize, column: &str) -> Result<Option<bool>, CoreError> {
    if is_null(raw) {
        return Ok(None);
    }
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "1.0" | "yes" | "y" | "positive" => Ok(Some(true)),
        "false" | "f" | "0" | "0.0" | "no" | "n" | "negative" => Ok(Some(false)),
        other => Err(CoreError::invalid_value(
            row,
            column,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Header name to column index, after renaming through `canonical`.
pub(crate) struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub(crate) fn new(headers: &StringRecord, canonical: impl Fn(&str) -> String) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            // First occurrence wins when a raw and a canonical name collide.
            positions.entry(canonical(name.trim())).or_insert(i);
        }
        Self { positions }
    }

    pub(crate) fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub(crate) fn require(&self, name: &str) -> Result<usize, CoreError> {
        self.get(name)
            .ok_or_else(|| CoreError::missing_column(name))
    }
}

/// Field `idx` of `record`, or `""` when the row is short.
pub(crate) fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_f64_nulls() {
        for raw in ["", " ", "NA", "NaN", "nan", "None"] {
            assert!(parse_f64(raw, 0, "x").unwrap().is_nan(), "{raw:?}");
        }
        assert_eq!(parse_f64(" 12.5 ", 0, "x").unwrap(), 12.5);
        assert!(parse_f64("abc", 3, "x").is_err());
    }

    #[test]
    fn test_parse_i64_accepts_integral_floats() {
        assert_eq!(parse_i64("9", 0, "x").unwrap(), Some(9));
        assert_eq!(parse_i64("9.0", 0, "x").unwrap(), Some(9));
        assert_eq!(parse_i64("NA", 0, "x").unwrap(), None);
        assert!(parse_i64("9.5", 0, "x").is_err());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("True", 0, "x").unwrap(), Some(true));
        assert_eq!(parse_bool("no", 0, "x").unwrap(), Some(false));
        assert_eq!(parse_bool("1", 0, "x").unwrap(), Some(true));
        assert_eq!(parse_bool("", 0, "x").unwrap(), None);
        let err = parse_bool("maybe", 7, "immunogenic").unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { row: 7, .. }));
    }
}
