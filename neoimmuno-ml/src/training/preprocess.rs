//! Per-fold preprocessing: log1p of skewed covariates, median imputation and
//! standardization.
//!
//! A [`Preprocessor`] is always fitted on training rows only and then applied
//! to both sides of the fold.

use crate::error::MlError;
use neoimmuno_core::stats::{mean, median, population_std};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Heavy-tailed columns that are log1p-transformed before imputation.
pub const LOG1P_COLUMNS: [&str; 4] = [
    "predicted_affinity",
    "tumor_abundance",
    "mhcflurry_affinity",
    "binding_affinity",
];

/// Which of `columns` get the log1p transform.
pub fn log1p_mask<S: AsRef<str>>(columns: &[S]) -> Vec<bool> {
    columns
        .iter()
        .map(|c| LOG1P_COLUMNS.contains(&c.as_ref()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    log1p: Vec<bool>,
    medians: Vec<f64>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

fn log_transform(value: f64, apply: bool) -> f64 {
    if !apply {
        return value;
    }
    let v = value.ln_1p();
    // Values at or below -1 have no finite log and count as missing.
    if v.is_finite() { v } else { f64::NAN }
}

impl Preprocessor {
    /// Learn medians, means and scales from `x`.
    ///
    /// A column with no observed value is imputed with `0.0` so the column
    /// count never changes between folds.
    pub fn fit(x: &[Vec<f64>], log1p: &[bool]) -> Result<Self, MlError> {
        let width = log1p.len();
        if let Some((i, row)) = x.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(MlError::invalid_input(format!(
                "row {i} has {} values, expected {width}",
                row.len()
            )));
        }

        let mut medians = Vec::with_capacity(width);
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for (j, &apply) in log1p.iter().enumerate() {
            let column: Vec<f64> = x.iter().map(|r| log_transform(r[j], apply)).collect();
            let mut fill = median(&column);
            if fill.is_nan() {
                warn!(column = j, "Column has no observed values; imputing 0.0");
                fill = 0.0;
            }
            let imputed: Vec<f64> = column
                .iter()
                .map(|&v| if v.is_nan() { fill } else { v })
                .collect();
            let m = mean(&imputed);
            let s = population_std(&imputed);

            medians.push(fill);
            means.push(if m.is_nan() { 0.0 } else { m });
            scales.push(if s.is_nan() || s == 0.0 { 1.0 } else { s });
        }

        Ok(Self {
            log1p: log1p.to_vec(),
            medians,
            means,
            scales,
        })
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, MlError> {
        x.iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() != self.medians.len() {
                    return Err(MlError::invalid_input(format!(
                        "row {i} has {} values, expected {}",
                        row.len(),
                        self.medians.len()
                    )));
                }
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(j, &v)| {
                        let v = log_transform(v, self.log1p[j]);
                        let v = if v.is_nan() { self.medians[j] } else { v };
                        (v - self.means[j]) / self.scales[j]
                    })
                    .collect())
            })
            .collect()
    }

    pub fn fit_transform(
        x: &[Vec<f64>],
        log1p: &[bool],
    ) -> Result<(Self, Vec<Vec<f64>>), MlError> {
        let fitted = Self::fit(x, log1p)?;
        let transformed = fitted.transform(x)?;
        Ok((fitted, transformed))
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }
}
