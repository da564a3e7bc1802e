//! Benchmark orchestration: feature sets, baselines and grouped-CV model
//! comparisons over one labelled table.

use crate::algorithms::ModelSpec;
use crate::error::MlError;
use crate::eval::{
    ComparisonTable, Evaluator, GroupMetrics, MetricBundle, per_group_metrics, top_importances,
};
use crate::scorer::SCORE_COLUMNS;
use crate::training::{CvPredictions, Dataset, FittedModel, SeedSequence, cross_val_predict};
use neoimmuno_core::data::FeatureTable;
use neoimmuno_core::features::{
    ContextFeatures, FeatureGroup, GlobalFeatures, PositionFeatures, SiteProperties,
    TcrSurfaceFeatures,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// The covariates the TESLA consortium distributed with the benchmark.
pub const TESLA_FEATURES: [&str; 8] = [
    "predicted_affinity",
    "binding_stability",
    "tumor_abundance",
    "frac_hydrophobic",
    "agretopicity",
    "foreignness",
    "mutation_position",
    "peptide_length",
];

/// Column holding the IEDB transfer-model probability.
pub const TRANSFER_SCORE_COLUMN: &str = "iedb_score";

const HYBRID_FEATURES: [&str; 13] = [
    "predicted_affinity",
    "binding_stability",
    "tumor_abundance",
    "agretopicity",
    "mhcflurry_presentation",
    "mhcflurry_affinity",
    "mhcflurry_processing",
    TRANSFER_SCORE_COLUMN,
    "mut_blosum_self",
    "mut_aa_rarity",
    "mut_self_hydro",
    "mut_self_charge",
    "mut_self_size",
];

/// Position-aware features: position, site, context, global and TCR surface.
pub fn novel_features() -> Vec<&'static str> {
    [
        PositionFeatures::COLUMNS,
        SiteProperties::COLUMNS,
        ContextFeatures::COLUMNS,
        GlobalFeatures::COLUMNS,
        TcrSurfaceFeatures::COLUMNS,
    ]
    .concat()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    Tesla,
    Novel,
    Mhcflurry,
    TeslaMhcflurry,
    NovelMhcflurry,
    All,
    Hybrid,
}

impl FeatureSet {
    pub const ALL: [FeatureSet; 7] = [
        Self::Tesla,
        Self::Novel,
        Self::Mhcflurry,
        Self::TeslaMhcflurry,
        Self::NovelMhcflurry,
        Self::All,
        Self::Hybrid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Tesla => "tesla",
            Self::Novel => "novel",
            Self::Mhcflurry => "mhcflurry",
            Self::TeslaMhcflurry => "tesla+mhcflurry",
            Self::NovelMhcflurry => "novel+mhcflurry",
            Self::All => "all",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn columns(self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = match self {
            Self::Tesla => TESLA_FEATURES.to_vec(),
            Self::Novel => novel_features(),
            Self::Mhcflurry => SCORE_COLUMNS.to_vec(),
            Self::TeslaMhcflurry => [&TESLA_FEATURES[..], &SCORE_COLUMNS[..]].concat(),
            Self::NovelMhcflurry => [novel_features().as_slice(), &SCORE_COLUMNS[..]].concat(),
            Self::All => [
                &TESLA_FEATURES[..],
                novel_features().as_slice(),
                &SCORE_COLUMNS[..],
            ]
            .concat(),
            Self::Hybrid => HYBRID_FEATURES.to_vec(),
        };
        let mut seen = std::collections::HashSet::new();
        columns.retain(|c| seen.insert(*c));
        columns
    }

    /// Columns of this set missing from `table`.
    pub fn missing_from(self, table: &FeatureTable) -> Vec<&'static str> {
        self.columns()
            .into_iter()
            .filter(|c| !table.has_column(c))
            .collect()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureSet {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|set| set.name() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                MlError::invalid_input(format!(
                    "unknown feature set '{s}' (expected one of: {})",
                    Self::ALL.map(Self::name).join(", ")
                ))
            })
    }
}

/// Single-covariate baselines: (column, display name, higher is better).
pub const SINGLE_FEATURE_BASELINES: [(&str, &str, bool); 5] = [
    ("predicted_affinity", "NetMHCpan affinity (inverted)", false),
    ("binding_stability", "Binding stability", true),
    ("tumor_abundance", "Tumor abundance (TPM)", true),
    ("frac_hydrophobic", "Fraction hydrophobic", true),
    ("foreignness", "Foreignness", true),
];

/// Uniform random scores from a seeded generator.
pub fn random_baseline(
    y_true: &[bool],
    seed: u64,
    evaluator: &Evaluator,
) -> Result<MetricBundle, MlError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let scores: Vec<f64> = y_true.iter().map(|_| rng.gen_range(0.0..1.0)).collect();
    evaluator.evaluate("Random", y_true, &scores)
}

fn oriented(column: &[f64], higher_is_better: bool) -> Vec<f64> {
    if higher_is_better {
        column.to_vec()
    } else {
        column.iter().map(|v| -v).collect()
    }
}

/// Each covariate used directly as a score. Columns that are absent or have
/// fewer than `min_non_null` observed values are skipped.
pub fn single_feature_baselines(
    table: &FeatureTable,
    y_true: &[bool],
    evaluator: &Evaluator,
) -> Result<Vec<MetricBundle>, MlError> {
    let min_non_null = evaluator.config().min_non_null;
    let mut bundles = Vec::new();
    for (column, name, higher_is_better) in SINGLE_FEATURE_BASELINES {
        let Some(values) = table.column(column) else {
            continue;
        };
        let observed = values.iter().filter(|v| !v.is_nan()).count();
        if observed < min_non_null {
            info!(baseline = name, observed, "Skipping baseline with too few values");
            continue;
        }
        bundles.push(evaluator.evaluate(name, y_true, &oriented(values, higher_is_better))?);
    }
    Ok(bundles)
}

/// Presentation score and inverted affinity from the external scorer, when
/// the table has been scored.
pub fn scorer_baselines(
    table: &FeatureTable,
    y_true: &[bool],
    evaluator: &Evaluator,
) -> Result<Vec<MetricBundle>, MlError> {
    let mut bundles = Vec::new();
    if let Some(presentation) = table.column(SCORE_COLUMNS[0]) {
        bundles.push(evaluator.evaluate("MHCflurry presentation", y_true, presentation)?);
    }
    if let Some(affinity) = table.column(SCORE_COLUMNS[1]) {
        bundles.push(evaluator.evaluate(
            "MHCflurry affinity (inv.)",
            y_true,
            &oriented(affinity, false),
        )?);
    }
    Ok(bundles)
}

/// One model trained on one feature set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRun {
    pub feature_set: FeatureSet,
    pub model: String,
    pub seed: u64,
    pub metrics: MetricBundle,
    pub predictions: CvPredictions,
}

/// The best model's per-group breakdown and full-data importances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestModel {
    pub name: String,
    pub per_group: Vec<GroupMetrics>,
    pub importances: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub comparison: ComparisonTable,
    pub runs: Vec<ModelRun>,
    pub skipped: Vec<FeatureSet>,
    pub best: Option<BestModel>,
    pub seeds: SeedSequence,
}

/// Grouped-CV model comparison over one labelled table.
pub struct Benchmark<'a> {
    table: &'a FeatureTable,
    y_true: &'a [bool],
    groups: &'a [String],
    evaluator: Evaluator,
    seeds: SeedSequence,
    top_importances: usize,
}

impl<'a> Benchmark<'a> {
    pub fn new(
        table: &'a FeatureTable,
        y_true: &'a [bool],
        groups: &'a [String],
        evaluator: Evaluator,
        run_seed: u64,
    ) -> Result<Self, MlError> {
        if y_true.len() != table.n_rows() || groups.len() != table.n_rows() {
            return Err(MlError::dataset(format!(
                "{} rows, {} labels and {} group keys",
                table.n_rows(),
                y_true.len(),
                groups.len()
            )));
        }
        Ok(Self {
            table,
            y_true,
            groups,
            evaluator,
            seeds: SeedSequence::new(run_seed),
            top_importances: 15,
        })
    }

    pub fn with_top_importances(mut self, n: usize) -> Self {
        self.top_importances = n;
        self
    }

    fn dataset(&self, set: FeatureSet) -> Result<Dataset, MlError> {
        let selected = self.table.select(&set.columns())?;
        Dataset::from_table(&selected, self.y_true.to_vec(), self.groups.to_vec())
    }

    /// Out-of-fold predictions and metrics for each model on one set.
    pub fn run_feature_set(
        &mut self,
        set: FeatureSet,
        specs: &[ModelSpec],
    ) -> Result<Vec<ModelRun>, MlError> {
        let data = self.dataset(set)?;
        let mut runs = Vec::with_capacity(specs.len());
        for spec in specs {
            let seed = self.seeds.derive(spec.short_name());
            let predictions = cross_val_predict(spec, &data, seed)?;
            let name = format!("{} ({})", spec.short_name(), set);
            let metrics = self
                .evaluator
                .evaluate(&name, self.y_true, &predictions.probabilities)?;
            info!(
                model = %name,
                auc_roc = metrics.auc_roc,
                auprc = metrics.auprc,
                "Model evaluated"
            );
            runs.push(ModelRun {
                feature_set: set,
                model: spec.short_name().to_string(),
                seed,
                metrics,
                predictions,
            });
        }
        Ok(runs)
    }

    /// Baselines first, then every (set, model) pair. Sets whose columns are
    /// not in the table are skipped with a warning.
    pub fn run(mut self, sets: &[FeatureSet], specs: &[ModelSpec]) -> Result<BenchmarkReport, MlError> {
        let mut comparison = ComparisonTable::new();
        let random_seed = self.evaluator.config().random_seed;
        comparison.push(random_baseline(self.y_true, random_seed, &self.evaluator)?);
        comparison.extend(single_feature_baselines(self.table, self.y_true, &self.evaluator)?);
        comparison.extend(scorer_baselines(self.table, self.y_true, &self.evaluator)?);

        let mut runs = Vec::new();
        let mut skipped = Vec::new();
        for &set in sets {
            let missing = set.missing_from(self.table);
            if !missing.is_empty() {
                warn!(feature_set = %set, missing = ?missing, "Skipping feature set");
                skipped.push(set);
                continue;
            }
            let set_runs = self.run_feature_set(set, specs)?;
            comparison.extend(set_runs.iter().map(|r| r.metrics.clone()));
            runs.extend(set_runs);
        }

        let best = self.best_model(&runs, specs)?;
        Ok(BenchmarkReport {
            comparison,
            runs,
            skipped,
            best,
            seeds: self.seeds,
        })
    }

    /// Highest-AUPRC model run, with per-group metrics and importances from
    /// a full-data refit.
    fn best_model(&self, runs: &[ModelRun], specs: &[ModelSpec]) -> Result<Option<BestModel>, MlError> {
        let table: ComparisonTable = runs.iter().map(|r| r.metrics.clone()).collect();
        let Some(best) = table.best_by_auprc() else {
            return Ok(None);
        };
        let Some(run) = runs.iter().find(|r| r.metrics.name == best.name) else {
            return Ok(None);
        };

        let per_group = per_group_metrics(self.y_true, &run.predictions.probabilities, self.groups)?;
        let importances = match specs.iter().find(|s| s.short_name() == run.model) {
            Some(spec) => {
                let fitted = FittedModel::fit(spec, &self.dataset(run.feature_set)?, run.seed)?;
                fitted
                    .ranked_importances()
                    .map(|ranked| top_importances(&ranked, self.top_importances))
                    .unwrap_or_default()
            }
            None => Vec::new(),
        };
        Ok(Some(BestModel {
            name: best.name.clone(),
            per_group,
            importances,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{ForestParams, LogisticParams};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_feature_set_sizes() {
        assert_eq!(FeatureSet::Tesla.columns().len(), 8);
        assert_eq!(FeatureSet::Novel.columns().len(), 27);
        assert_eq!(FeatureSet::Mhcflurry.columns().len(), 3);
        assert_eq!(FeatureSet::TeslaMhcflurry.columns().len(), 11);
        assert_eq!(FeatureSet::NovelMhcflurry.columns().len(), 30);
        assert_eq!(FeatureSet::All.columns().len(), 38);
        assert_eq!(FeatureSet::Hybrid.columns().len(), 13);
    }

    #[test]
    fn test_feature_set_names_parse() {
        for set in FeatureSet::ALL {
            assert_eq!(set.name().parse::<FeatureSet>().unwrap(), set);
        }
        assert!("everything".parse::<FeatureSet>().is_err());
    }

    #[test]
    fn test_random_baseline_is_seeded() {
        let y: Vec<bool> = (0..50).map(|i| i % 5 == 0).collect();
        let evaluator = Evaluator::default();
        let a = random_baseline(&y, 42, &evaluator).unwrap();
        let b = random_baseline(&y, 42, &evaluator).unwrap();
        assert_eq!(a.auc_roc, b.auc_roc);
        assert_eq!(a.name, "Random");
    }

    #[test]
    fn test_single_feature_baselines_skip_sparse_and_invert_affinity() {
        let n = 120;
        let y: Vec<bool> = (0..n).map(|i| i < 20).collect();
        let mut table = FeatureTable::new(n);
        // Low affinity (strong binding) for positives.
        table
            .add_column("predicted_affinity", (0..n).map(|i| i as f64).collect())
            .unwrap();
        table
            .add_column(
                "foreignness",
                (0..n).map(|i| if i < 10 { 1.0 } else { f64::NAN }).collect(),
            )
            .unwrap();

        let bundles = single_feature_baselines(&table, &y, &Evaluator::default()).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].name, "NetMHCpan affinity (inverted)");
        assert_eq!(bundles[0].auc_roc, 1.0);
    }

    fn synthetic() -> (FeatureTable, Vec<bool>, Vec<String>) {
        let n = 90;
        let y: Vec<bool> = (0..n).map(|i| i % 6 == 0).collect();
        let mut table = FeatureTable::new(n);
        for (j, name) in TESLA_FEATURES.iter().enumerate() {
            let values = (0..n)
                .map(|i| {
                    let signal = if y[i] { 2.0 } else { 0.0 };
                    signal * (j % 2) as f64 + ((i * (j + 3)) % 7) as f64
                })
                .collect();
            table.add_column(name, values).unwrap();
        }
        let groups = (0..n).map(|i| format!("P{}", i % 5)).collect();
        (table, y, groups)
    }

    #[test]
    fn test_benchmark_runs_available_sets_and_picks_best() {
        let (table, y, groups) = synthetic();
        let specs = vec![
            ModelSpec::LogisticRegression(LogisticParams::default()),
            ModelSpec::RandomForest(ForestParams {
                n_estimators: 10,
                ..ForestParams::default()
            }),
        ];
        let report = Benchmark::new(&table, &y, &groups, Evaluator::default(), 42)
            .unwrap()
            .with_top_importances(3)
            .run(&[FeatureSet::Tesla, FeatureSet::Mhcflurry], &specs)
            .unwrap();

        assert_eq!(report.skipped, vec![FeatureSet::Mhcflurry]);
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.comparison.rows()[0].name, "Random");
        assert!(report.comparison.get("LR (tesla)").is_some());
        let best = report.best.unwrap();
        assert_eq!(best.per_group.len(), 5);
        assert!(best.importances.len() <= 3);
        assert!(report.seeds.component_seeds.contains_key("RF"));
    }
}
