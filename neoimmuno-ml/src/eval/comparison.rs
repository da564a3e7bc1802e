//! Side-by-side comparison of metric bundles.

use super::harness::MetricBundle;
use serde::{Deserialize, Serialize};

/// Bundles kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    rows: Vec<MetricBundle>,
}

impl ComparisonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bundle: MetricBundle) {
        self.rows.push(bundle);
    }

    pub fn extend(&mut self, bundles: impl IntoIterator<Item = MetricBundle>) {
        self.rows.extend(bundles);
    }

    pub fn rows(&self) -> &[MetricBundle] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MetricBundle> {
        self.rows.iter().find(|b| b.name == name)
    }

    /// Highest AUPRC; `NaN` never wins, the first row wins ties.
    pub fn best_by_auprc(&self) -> Option<&MetricBundle> {
        self.rows
            .iter()
            .filter(|b| !b.auprc.is_nan())
            .fold(None, |best: Option<&MetricBundle>, b| match best {
                Some(current) if current.auprc >= b.auprc => Some(current),
                _ => Some(b),
            })
    }

    /// Fixed-width text rendering of the headline metrics.
    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|b| b.name.len())
            .max()
            .unwrap_or(0)
            .max("model".len());
        let mut out = format!(
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}\n",
            "model", "auc_roc", "auprc", "fr", "ttif"
        );
        for b in &self.rows {
            out.push_str(&format!(
                "{:<width$}  {:>8.4}  {:>8.4}  {:>8.4}  {:>8.4}\n",
                b.name, b.auc_roc, b.auprc, b.fr, b.ttif
            ));
        }
        out
    }
}

impl FromIterator<MetricBundle> for ComparisonTable {
    fn from_iter<I: IntoIterator<Item = MetricBundle>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::evaluate;

    #[test]
    fn test_best_by_auprc_skips_nan() {
        let y = [true, false, false, true];
        let good = evaluate("good", &y, &[0.9, 0.1, 0.2, 0.8]).unwrap();
        let weak = evaluate("weak", &y, &[0.1, 0.9, 0.2, 0.8]).unwrap();
        let empty = evaluate("empty", &[false, false], &[0.1, 0.2]).unwrap();

        let table: ComparisonTable = vec![weak, empty, good].into_iter().collect();
        assert_eq!(table.best_by_auprc().unwrap().name, "good");
        assert_eq!(table.rows()[0].name, "weak");
    }

    #[test]
    fn test_render_has_one_line_per_row() {
        let mut table = ComparisonTable::new();
        assert!(table.best_by_auprc().is_none());
        table.push(evaluate("random", &[true, false], &[0.4, 0.6]).unwrap());
        let text = table.render();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("random"));
    }
}
