//! Small descriptive statistics shared by features, imputation and metrics.
//!
//! Empty inputs return `NaN` rather than panicking.

use std::collections::BTreeMap;

/// Additive guard inside `log2` so that zero frequencies never produce `-inf`.
pub const ENTROPY_EPSILON: f64 = 1e-10;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (`ddof = 0`).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median with the midpoint rule for even lengths. `NaN` entries are ignored.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Base-2 Shannon entropy of a symbol histogram, `-Σ f·log2(f + ε)`.
///
/// Counts are summed in key order so the result is bit-reproducible.
pub fn shannon_entropy<K: Ord>(counts: &BTreeMap<K, usize>) -> f64 {
    let total: usize = counts.values().sum();
    if total == 0 {
        return f64::NAN;
    }
    let n = total as f64;
    -counts
        .values()
        .map(|&c| {
            let f = c as f64 / n;
            f * (f + ENTROPY_EPSILON).log2()
        })
        .sum::<f64>()
}

/// Histogram of items in deterministic key order.
pub fn histogram<K: Ord, I: IntoIterator<Item = K>>(items: I) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}
