//! Rendering and persisting results.

use neoimmuno_ml::eval::{ComparisonTable, GroupMetrics, MetricBundle, RankAnalysis, RankedRecord};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How results are printed to stdout.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// Print metric bundles in the requested format.
pub fn write_bundles<W: Write>(
    out: &mut W,
    bundles: &[MetricBundle],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => {
            let table: ComparisonTable = bundles.iter().cloned().collect();
            write!(out, "{}", table.render())?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, bundles)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            for bundle in bundles {
                writer.serialize(bundle)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Save a comparison as `<stem>.csv` and `<stem>.json` under `dir`.
pub fn save_comparison(dir: &Path, stem: &str, table: &ComparisonTable) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let csv_path = dir.join(format!("{stem}.csv"));
    let mut file = std::fs::File::create(&csv_path)?;
    write_bundles(&mut file, table.rows(), OutputFormat::Csv)?;
    let json_path = dir.join(format!("{stem}.json"));
    write_json(&json_path, table.rows())?;
    Ok(vec![csv_path, json_path])
}

pub fn render_groups(groups: &[GroupMetrics]) -> String {
    let mut out = format!(
        "{:<12}  {:>6}  {:>6}  {:>8}  {:>8}\n",
        "group", "n", "pos", "auc_roc", "auprc"
    );
    for g in groups {
        out.push_str(&format!(
            "{:<12}  {:>6}  {:>6}  {:>8.4}  {:>8.4}\n",
            g.group, g.n_total, g.n_positive, g.auc_roc, g.auprc
        ));
    }
    out
}

pub fn render_importances(importances: &[(String, f64)]) -> String {
    let width = importances
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    importances
        .iter()
        .enumerate()
        .map(|(i, (name, value))| format!("{:>3}. {:<width$}  {:>8.4}\n", i + 1, name, value))
        .collect()
}

fn render_records(title: &str, records: &[RankedRecord], limit: usize) -> String {
    let mut out = format!("{title} ({}):\n", records.len());
    for r in records.iter().take(limit) {
        out.push_str(&format!(
            "  #{:<5} {:<15} {:<13} {:<8} score={:.4}\n",
            r.rank,
            r.peptide,
            r.allele,
            r.patient_id.as_deref().unwrap_or("-"),
            r.score
        ));
    }
    out
}

pub fn render_rank_analysis(analysis: &RankAnalysis) -> String {
    let mut out = format!(
        "{} records, {} positive\nmedian rank: positives {:.1}, negatives {:.1}\n\n",
        analysis.n_total,
        analysis.n_positive,
        analysis.median_rank_positive,
        analysis.median_rank_negative
    );
    out.push_str(&render_records("False negatives", &analysis.false_negatives, 20));
    out.push_str(&render_records("False positives", &analysis.false_positives, 20));
    out.push_str(&render_records("True positives", &analysis.true_positives, 20));

    out.push_str("\nDetection by group:\n");
    for d in &analysis.by_group {
        out.push_str(&format!("  {:<12} {}/{} of {}\n", d.key, d.detected, d.positives, d.total));
    }
    out.push_str("\nDetection by allele:\n");
    for d in &analysis.by_allele {
        out.push_str(&format!("  {:<14} {}/{} of {}\n", d.key, d.detected, d.positives, d.total));
    }
    out.push_str("\nImmunogenic rate by length:\n");
    for l in &analysis.by_length {
        out.push_str(&format!("  {:>2}-mer  {}/{}  {:.3}\n", l.length, l.positives, l.total, l.rate));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoimmuno_ml::evaluate;
    use pretty_assertions::assert_eq;

    fn bundle() -> MetricBundle {
        evaluate("LR (tesla)", &[true, false, true, false], &[0.9, 0.2, 0.6, 0.4]).unwrap()
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let mut buf = Vec::new();
        write_bundles(&mut buf, &[bundle()], OutputFormat::Csv).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("name,n_total"));
        assert!(lines[1].starts_with("LR (tesla),4"));
    }

    #[test]
    fn test_json_is_an_array() {
        let mut buf = Vec::new();
        write_bundles(&mut buf, &[bundle()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["name"], "LR (tesla)");
        assert_eq!(value[0]["auc_roc"], 1.0);
    }

    #[test]
    fn test_save_comparison_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let table: ComparisonTable = std::iter::once(bundle()).collect();
        let paths = save_comparison(dir.path(), "benchmark", &table).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_render_importances_numbers_rows() {
        let text = render_importances(&[("binding_stability".into(), 0.4), ("foreignness".into(), 0.1)]);
        assert!(text.starts_with("  1. binding_stability"));
        assert_eq!(text.lines().count(), 2);
    }
}
