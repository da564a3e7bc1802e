//! Column-oriented numeric tables.
//!
//! Models pick named columns out of a [`FeatureTable`], so feature sets are
//! lists of names rather than index arithmetic. Missing values are `NaN`.

use crate::error::CoreError;
use crate::features::{FeatureGroup, FeatureRecord, SequenceFeatures, features_for};
use crate::positions::PositionModel;
use crate::record::{Covariates, PeptideRecord};
use serde::{Deserialize, Serialize};
use std::io;

/// Record-level metadata exposed as numeric columns next to the features.
pub const METADATA_COLUMNS: [&str; 2] = ["mutation_position", "peptide_length"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    n_rows: usize,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FeatureTable {
    /// An empty table with a fixed row count.
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// One row per feature record, columns in schema order.
    pub fn from_features(records: &[FeatureRecord]) -> Self {
        let names = FeatureRecord::columns();
        let mut columns = vec![Vec::with_capacity(records.len()); names.len()];
        for record in records {
            for (column, value) in columns.iter_mut().zip(record.values()) {
                column.push(value);
            }
        }
        Self {
            n_rows: records.len(),
            names: names.into_iter().map(String::from).collect(),
            columns,
        }
    }

    /// Covariates, metadata and every engineered feature for each record.
    pub fn from_peptides(records: &[PeptideRecord], model: &PositionModel) -> Self {
        let features: Vec<FeatureRecord> = records.iter().map(|r| features_for(r, model)).collect();
        let mut table = Self::new(records.len());

        for (i, name) in Covariates::COLUMNS.iter().enumerate() {
            let values = records.iter().map(|r| r.covariates.values()[i]).collect();
            table.push_column(name, values);
        }
        table.push_column(
            METADATA_COLUMNS[0],
            records
                .iter()
                .map(|r| r.mutation_position.map_or(f64::NAN, |p| p as f64))
                .collect(),
        );
        table.push_column(
            METADATA_COLUMNS[1],
            records.iter().map(|r| r.peptide_length as f64).collect(),
        );

        let engineered = Self::from_features(&features);
        for (name, column) in engineered.names.into_iter().zip(engineered.columns) {
            table.push_column(&name, column);
        }
        table
    }

    /// Sequence-composition features only.
    pub fn from_sequences<S: AsRef<str>>(peptides: &[S]) -> Self {
        let mut columns = vec![Vec::with_capacity(peptides.len()); SequenceFeatures::COLUMNS.len()];
        for peptide in peptides {
            let residues: Vec<char> = peptide.as_ref().chars().collect();
            let values = SequenceFeatures::compute(&residues).values();
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }
        Self {
            n_rows: peptides.len(),
            names: SequenceFeatures::COLUMNS.iter().map(|s| s.to_string()).collect(),
            columns,
        }
    }

    fn push_column(&mut self, name: &str, values: Vec<f64>) {
        self.names.push(name.to_string());
        self.columns.push(values);
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Add or replace a column. The length must match the row count.
    pub fn add_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), CoreError> {
        if values.len() != self.n_rows {
            return Err(CoreError::schema(format!(
                "column '{name}' has {} values, table has {} rows",
                values.len(),
                self.n_rows
            )));
        }
        match self.names.iter().position(|n| n == name) {
            Some(i) => self.columns[i] = values,
            None => self.push_column(name, values),
        }
        Ok(())
    }

    /// A new table holding `names`, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, CoreError> {
        let mut selected = Self::new(self.n_rows);
        for name in names {
            let name = name.as_ref();
            let column = self
                .column(name)
                .ok_or_else(|| CoreError::missing_column(name))?;
            selected.push_column(name, column.to_vec());
        }
        Ok(selected)
    }

    /// A new table holding only `rows`, in the order given.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            n_rows: rows.len(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&r| c[r]).collect())
                .collect(),
        }
    }

    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }

    /// Row-major copy, the layout the classifiers consume.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows).map(|i| self.row(i)).collect()
    }

    /// Write as CSV with optional leading text columns. `NaN` is written as
    /// an empty field.
    pub fn write_csv<W: io::Write>(
        &self,
        writer: W,
        keys: &[(&str, Vec<String>)],
    ) -> Result<(), CoreError> {
        if let Some((name, values)) = keys.iter().find(|(_, v)| v.len() != self.n_rows) {
            return Err(CoreError::schema(format!(
                "key column '{name}' has {} values, table has {} rows",
                values.len(),
                self.n_rows
            )));
        }

        let mut out = csv::Writer::from_writer(writer);
        let header: Vec<&str> = keys
            .iter()
            .map(|(name, _)| *name)
            .chain(self.names.iter().map(String::as_str))
            .collect();
        out.write_record(&header)?;

        for i in 0..self.n_rows {
            let mut row: Vec<String> = keys.iter().map(|(_, v)| v[i].clone()).collect();
            row.extend(self.columns.iter().map(|c| format_value(c[i])));
            out.write_record(&row)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::default_model;
    use pretty_assertions::assert_eq;

    fn records() -> Vec<PeptideRecord> {
        vec![
            PeptideRecord::new("SIINFEKLV", "HLA-A*02:01")
                .with_mutation_position(Some(5))
                .with_label(true),
            PeptideRecord::new("KLGGALQAK", "HLA-A*03:01").with_label(false),
        ]
    }

    #[test]
    fn test_from_peptides_layout() {
        let table = FeatureTable::from_peptides(&records(), default_model());
        assert_eq!(table.n_rows(), 2);
        assert_eq!(
            table.n_cols(),
            Covariates::COLUMNS.len() + METADATA_COLUMNS.len() + FeatureRecord::columns().len()
        );
        let positions = table.column("mutation_position").unwrap();
        assert_eq!(positions[0], 5.0);
        assert!(positions[1].is_nan());
        assert_eq!(table.column("peptide_length").unwrap(), &[9.0, 9.0]);
    }

    #[test]
    fn test_select_and_missing_column() {
        let table = FeatureTable::from_peptides(&records(), default_model());
        let picked = table.select(&["peptide_length", "mut_at_p2"]).unwrap();
        assert_eq!(picked.column_names(), &["peptide_length", "mut_at_p2"]);
        assert!(matches!(
            table.select(&["nope"]),
            Err(CoreError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_add_column_checks_length() {
        let mut table = FeatureTable::new(2);
        table.add_column("a", vec![1.0, 2.0]).unwrap();
        table.add_column("a", vec![3.0, 4.0]).unwrap();
        assert_eq!(table.n_cols(), 1);
        assert_eq!(table.column("a").unwrap(), &[3.0, 4.0]);
        assert!(table.add_column("b", vec![1.0]).is_err());
    }

    #[test]
    fn test_take_rows_and_to_rows() {
        let mut table = FeatureTable::new(3);
        table.add_column("x", vec![1.0, 2.0, 3.0]).unwrap();
        table.add_column("y", vec![4.0, 5.0, 6.0]).unwrap();
        let sub = table.take_rows(&[2, 0]);
        assert_eq!(sub.to_rows(), vec![vec![3.0, 6.0], vec![1.0, 4.0]]);
    }

    #[test]
    fn test_write_csv_blanks_nan() {
        let mut table = FeatureTable::new(2);
        table.add_column("x", vec![1.5, f64::NAN]).unwrap();
        let mut buf = Vec::new();
        table
            .write_csv(&mut buf, &[("peptide", vec!["AAA".into(), "CCC".into()])])
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "peptide,x\nAAA,1.5\nCCC,\n");
    }

    #[test]
    fn test_from_sequences() {
        let table = FeatureTable::from_sequences(&["AAAA", "AC"]);
        assert_eq!(table.n_cols(), SequenceFeatures::COLUMNS.len());
        assert_eq!(table.column("aa_frac_A").unwrap(), &[1.0, 0.5]);
        assert_eq!(table.column("seq_length").unwrap(), &[4.0, 2.0]);
    }
}
