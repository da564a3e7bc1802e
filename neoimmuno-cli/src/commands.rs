//! CLI subcommand handlers.

use crate::report::{self, OutputFormat};
use crate::{Commands, ConfigAction, Inputs};
use anyhow::Context as _;
use neoimmuno_core::PeptideRecord;
use neoimmuno_core::data::{FeatureTable, load_iedb, load_tesla, parse_bool, parse_f64};
use neoimmuno_ml::benchmark::{Benchmark, FeatureSet};
use neoimmuno_ml::config::{ModelsConfig, Settings, load_config, load_config_file};
use neoimmuno_ml::eval::{Evaluator, class_means, rank_analysis, top_importances};
use neoimmuno_ml::scorer::{
    MhcflurryPredictor, PrecomputedPredictor, PresentationPredictor, ScorerAdapter,
    add_score_columns,
};
use neoimmuno_ml::training::{
    Dataset, FittedModel, RunManifest, SeedSequence, cross_val_predict, groups_of, labels_of,
};
use neoimmuno_ml::transfer::{add_transfer_column, run_transfer};
use neoimmuno_ml::{ModelSpec, PythonRuntime};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum InputError {
    #[error("no --{flag} given and data.{flag}_path is not configured")]
    Missing { flag: &'static str },
    #[error("unknown model '{0}' (expected lr, rf or gb)")]
    UnknownModel(String),
    #[error("'{column}' is not a column of {path}")]
    MissingColumn { column: String, path: String },
}

/// Workspace and effective settings for one invocation.
struct Context {
    workspace: PathBuf,
    settings: Settings,
}

impl Context {
    fn load(workspace: &Path, config: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match config {
            Some(path) => load_config_file(path),
            None => load_config(Some(workspace), None),
        }
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
        Ok(Self {
            workspace: workspace.to_path_buf(),
            settings,
        })
    }

    /// Configured paths are relative to the workspace.
    fn in_workspace(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    fn tesla_path(&self, inputs: &Inputs) -> Result<PathBuf, InputError> {
        inputs
            .tesla
            .clone()
            .or_else(|| self.settings.data.tesla_path.as_deref().map(|p| self.in_workspace(p)))
            .ok_or(InputError::Missing { flag: "tesla" })
    }

    fn scores_path(&self, inputs: &Inputs) -> Option<PathBuf> {
        inputs
            .scores
            .clone()
            .or_else(|| self.settings.data.scores_path.as_deref().map(|p| self.in_workspace(p)))
    }

    fn iedb_path(&self, cli: Option<PathBuf>) -> Option<PathBuf> {
        cli.or_else(|| self.settings.data.iedb_path.as_deref().map(|p| self.in_workspace(p)))
    }

    fn output_dir(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.unwrap_or_else(|| self.in_workspace(&self.settings.data.output_dir))
    }

    fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.settings.evaluation.clone())
    }

    fn features(&self, records: &[PeptideRecord]) -> FeatureTable {
        FeatureTable::from_peptides(records, &self.settings.positions)
    }

    fn predictor(
        &self,
        scores: Option<&Path>,
        live: bool,
    ) -> anyhow::Result<Option<Arc<dyn PresentationPredictor>>> {
        if let Some(path) = scores {
            return Ok(Some(Arc::new(PrecomputedPredictor::from_path(path)?)));
        }
        if live {
            let runtime = PythonRuntime::from_config(&self.settings.scorer, self.workspace.clone());
            return Ok(Some(Arc::new(MhcflurryPredictor::new(runtime))));
        }
        Ok(None)
    }

    /// Add the presentation columns when a predictor is available. Returns
    /// whether the table was scored.
    async fn attach_scores(
        &self,
        records: &[PeptideRecord],
        table: &mut FeatureTable,
        scores: Option<&Path>,
        live: bool,
    ) -> anyhow::Result<bool> {
        let Some(predictor) = self.predictor(scores, live)? else {
            info!("No presentation scores; scorer feature sets will be skipped");
            return Ok(false);
        };
        let adapter = ScorerAdapter::new(predictor, &self.settings.scorer);
        let outcomes = adapter.score_records(records).await;
        add_score_columns(table, &outcomes)?;
        Ok(true)
    }
}

fn record_keys(records: &[PeptideRecord]) -> Vec<(&'static str, Vec<String>)> {
    vec![
        ("peptide", records.iter().map(|r| r.peptide.clone()).collect()),
        ("allele", records.iter().map(|r| r.allele.clone()).collect()),
        (
            "patient_id",
            records
                .iter()
                .map(|r| r.patient_id.clone().unwrap_or_default())
                .collect(),
        ),
        (
            "immunogenic",
            records
                .iter()
                .map(|r| match r.immunogenic {
                    Some(true) => "True".to_string(),
                    Some(false) => "False".to_string(),
                    None => String::new(),
                })
                .collect(),
        ),
    ]
}

fn write_table(
    table: &FeatureTable,
    keys: &[(&str, Vec<String>)],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            table.write_csv(std::fs::File::create(path)?, keys)?;
            info!(path = %path.display(), rows = table.n_rows(), "Wrote table");
        }
        None => table.write_csv(std::io::stdout().lock(), keys)?,
    }
    Ok(())
}

/// Model specs by short name; every configured model when `names` is empty.
fn select_models(names: &[String], config: &ModelsConfig) -> anyhow::Result<Vec<ModelSpec>> {
    let available = config.specs();
    if names.is_empty() {
        return Ok(available);
    }
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|s| s.short_name().eq_ignore_ascii_case(name.trim()))
                .cloned()
                .ok_or_else(|| InputError::UnknownModel(name.clone()).into())
        })
        .collect()
}

/// Labels and score columns from an arbitrary CSV.
fn read_scored_csv(
    path: &Path,
    label: &str,
    scores: &[String],
) -> anyhow::Result<(Vec<bool>, Vec<Vec<f64>>)> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let index = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| InputError::MissingColumn {
                column: column.to_string(),
                path: path.display().to_string(),
            })
    };
    let label_idx = index(label)?;
    let score_idx = scores
        .iter()
        .map(|s| index(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut labels = Vec::new();
    let mut columns = vec![Vec::new(); scores.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let value = parse_bool(field(label_idx), row, label)?
            .with_context(|| format!("row {row}: missing '{label}'"))?;
        labels.push(value);
        for ((column, &idx), name) in columns.iter_mut().zip(&score_idx).zip(scores) {
            column.push(parse_f64(field(idx), row, name)?);
        }
    }
    Ok((labels, columns))
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let ctx = Context::load(workspace, config)?;
    match command {
        Commands::Features { inputs, output } => handle_features(&ctx, &inputs, output.as_deref()),
        Commands::Evaluate {
            input,
            label,
            scores,
            inverted,
            format,
        } => handle_evaluate(&ctx, &input, &label, &scores, &inverted, format),
        Commands::Score { inputs, output } => handle_score(&ctx, &inputs, output.as_deref()).await,
        Commands::Benchmark {
            inputs,
            iedb,
            feature_sets,
            models,
            live_scorer,
            output_dir,
            format,
        } => {
            let options = BenchmarkOptions {
                iedb,
                feature_sets,
                models,
                live_scorer,
                output_dir,
                format,
            };
            handle_benchmark(&ctx, &inputs, options).await
        }
        Commands::Transfer {
            inputs,
            iedb,
            hybrid,
            output_dir,
            format,
        } => handle_transfer(&ctx, &inputs, iedb, hybrid, output_dir, format).await,
        Commands::Analyze {
            inputs,
            feature_set,
            model,
            output_dir,
        } => handle_analyze(&ctx, &inputs, feature_set, &model, output_dir).await,
        Commands::Config { action } => handle_config(&ctx, action),
    }
}

fn handle_features(ctx: &Context, inputs: &Inputs, output: Option<&Path>) -> anyhow::Result<()> {
    let records = load_tesla(&ctx.tesla_path(inputs)?)?;
    let table = ctx.features(&records);
    write_table(&table, &record_keys(&records), output)
}

fn handle_evaluate(
    ctx: &Context,
    input: &Path,
    label: &str,
    scores: &[String],
    inverted: &[String],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (labels, columns) = read_scored_csv(input, label, scores)?;
    let evaluator = ctx.evaluator();
    let mut bundles = Vec::with_capacity(scores.len());
    for (name, column) in scores.iter().zip(columns) {
        let column = if inverted.contains(name) {
            column.iter().map(|v| -v).collect()
        } else {
            column
        };
        bundles.push(evaluator.evaluate(name, &labels, &column)?);
    }
    report::write_bundles(&mut std::io::stdout().lock(), &bundles, format)
}

async fn handle_score(ctx: &Context, inputs: &Inputs, output: Option<&Path>) -> anyhow::Result<()> {
    let records = load_tesla(&ctx.tesla_path(inputs)?)?;
    let scores = ctx.scores_path(inputs);
    let mut table = FeatureTable::new(records.len());
    if scores.is_none() {
        let runtime = PythonRuntime::from_config(&ctx.settings.scorer, ctx.workspace.clone());
        if !MhcflurryPredictor::new(runtime).is_available().await {
            anyhow::bail!("mhcflurry is not importable; install it or pass --scores");
        }
    }
    ctx.attach_scores(&records, &mut table, scores.as_deref(), true)
        .await?;
    let keys: Vec<(&str, Vec<String>)> = record_keys(&records).into_iter().take(2).collect();
    write_table(&table, &keys, output)
}

struct BenchmarkOptions {
    iedb: Option<PathBuf>,
    feature_sets: Vec<FeatureSet>,
    models: Vec<String>,
    live_scorer: bool,
    output_dir: Option<PathBuf>,
    format: OutputFormat,
}

async fn handle_benchmark(
    ctx: &Context,
    inputs: &Inputs,
    options: BenchmarkOptions,
) -> anyhow::Result<()> {
    let seed = ctx.settings.models.seed;
    let mut manifest = RunManifest::capture("benchmark", seed);
    let mut seeds = SeedSequence::new(seed);

    let tesla = ctx.tesla_path(inputs)?;
    manifest.record_input(&tesla)?;
    let records = load_tesla(&tesla)?;
    let mut table = ctx.features(&records);

    let scores = ctx.scores_path(inputs);
    if let Some(path) = &scores {
        manifest.record_input(path)?;
    }
    ctx.attach_scores(&records, &mut table, scores.as_deref(), options.live_scorer)
        .await?;

    let evaluator = ctx.evaluator();
    if let Some(iedb) = ctx.iedb_path(options.iedb) {
        manifest.record_input(&iedb)?;
        let transfer = run_transfer(
            &load_iedb(&iedb)?,
            &records,
            &ctx.settings.transfer,
            &evaluator,
            &mut seeds,
        )?;
        add_transfer_column(&mut table, transfer.scores)?;
    }

    let sets = if options.feature_sets.is_empty() {
        FeatureSet::ALL.to_vec()
    } else {
        options.feature_sets
    };
    let specs = select_models(&options.models, &ctx.settings.models)?;
    let y = labels_of(&records)?;
    let groups = groups_of(&records)?;
    let results = Benchmark::new(&table, &y, &groups, evaluator, seed)?.run(&sets, &specs)?;

    let mut stdout = std::io::stdout().lock();
    report::write_bundles(&mut stdout, results.comparison.rows(), options.format)?;
    if options.format == OutputFormat::Table {
        if let Some(best) = &results.best {
            writeln!(stdout, "\nBest by AUPRC: {}\n", best.name)?;
            write!(stdout, "{}", report::render_groups(&best.per_group))?;
            if !best.importances.is_empty() {
                writeln!(stdout, "\nTop features:")?;
                write!(stdout, "{}", report::render_importances(&best.importances))?;
            }
        }
    }

    let out_dir = ctx.output_dir(options.output_dir);
    report::save_comparison(&out_dir, "benchmark", &results.comparison)?;
    report::write_json(&out_dir.join("benchmark_report.json"), &results)?;
    manifest.record_seeds(&seeds);
    manifest.record_seeds(&results.seeds);
    let path = manifest.write(&out_dir)?;
    info!(manifest = %path.display(), "Benchmark complete");
    Ok(())
}

async fn handle_transfer(
    ctx: &Context,
    inputs: &Inputs,
    iedb: Option<PathBuf>,
    hybrid: bool,
    output_dir: Option<PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let seed = ctx.settings.models.seed;
    let mut manifest = RunManifest::capture("transfer", seed);
    let mut seeds = SeedSequence::new(seed);

    let tesla = ctx.tesla_path(inputs)?;
    let iedb = ctx.iedb_path(iedb).ok_or(InputError::Missing { flag: "iedb" })?;
    manifest.record_input(&tesla)?;
    manifest.record_input(&iedb)?;
    let records = load_tesla(&tesla)?;
    let evaluator = ctx.evaluator();
    let transfer = run_transfer(
        &load_iedb(&iedb)?,
        &records,
        &ctx.settings.transfer,
        &evaluator,
        &mut seeds,
    )?;

    let mut bundles = vec![transfer.pan_allele.metrics.clone()];
    bundles.extend(transfer.allele_specific.iter().map(|o| o.metrics.clone()));

    let out_dir = ctx.output_dir(output_dir);
    let mut hybrid_results = None;
    if hybrid {
        let scores = ctx.scores_path(inputs);
        let mut table = ctx.features(&records);
        if !ctx
            .attach_scores(&records, &mut table, scores.as_deref(), true)
            .await?
        {
            anyhow::bail!("the hybrid model needs presentation scores");
        }
        if let Some(path) = &scores {
            manifest.record_input(path)?;
        }
        add_transfer_column(&mut table, transfer.scores.clone())?;
        let specs: Vec<ModelSpec> = ctx
            .settings
            .models
            .specs()
            .into_iter()
            .filter(|s| matches!(s, ModelSpec::RandomForest(_) | ModelSpec::GradientBoosting(_)))
            .collect();
        let y = labels_of(&records)?;
        let groups = groups_of(&records)?;
        let results = Benchmark::new(&table, &y, &groups, evaluator, seed)?
            .run(&[FeatureSet::Hybrid], &specs)?;
        bundles.extend(results.runs.iter().map(|r| r.metrics.clone()));
        manifest.record_seeds(&results.seeds);
        hybrid_results = Some(results);
    }

    let mut stdout = std::io::stdout().lock();
    report::write_bundles(&mut stdout, &bundles, format)?;
    if format == OutputFormat::Table {
        writeln!(
            stdout,
            "\nTransfer model: {} IEDB pairs ({} positive)",
            transfer.pan_allele.n_train, transfer.pan_allele.n_train_positive
        )?;
        writeln!(stdout, "Top sequence features:")?;
        write!(stdout, "{}", report::render_importances(&transfer.top_features))?;
        if let Some(best) = hybrid_results.as_ref().and_then(|r| r.best.as_ref()) {
            writeln!(stdout, "\nHybrid best by AUPRC: {}\n", best.name)?;
            write!(stdout, "{}", report::render_groups(&best.per_group))?;
            writeln!(stdout, "\nHybrid top features:")?;
            write!(stdout, "{}", report::render_importances(&best.importances))?;
        }
    }

    report::write_json(&out_dir.join("transfer_report.json"), &transfer)?;
    if let Some(results) = &hybrid_results {
        report::save_comparison(&out_dir, "hybrid", &results.comparison)?;
    }
    manifest.record_seeds(&seeds);
    manifest.write(&out_dir)?;
    Ok(())
}

async fn handle_analyze(
    ctx: &Context,
    inputs: &Inputs,
    feature_set: FeatureSet,
    model: &str,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let seed = ctx.settings.models.seed;
    let mut manifest = RunManifest::capture("analyze", seed);
    let mut seeds = SeedSequence::new(seed);

    let tesla = ctx.tesla_path(inputs)?;
    manifest.record_input(&tesla)?;
    let records = load_tesla(&tesla)?;
    let mut table = ctx.features(&records);
    let scores = ctx.scores_path(inputs);
    ctx.attach_scores(&records, &mut table, scores.as_deref(), false)
        .await?;

    let missing = feature_set.missing_from(&table);
    if !missing.is_empty() {
        anyhow::bail!("feature set '{feature_set}' needs columns {missing:?}");
    }
    let spec = select_models(&[model.to_string()], &ctx.settings.models)?
        .into_iter()
        .next()
        .ok_or_else(|| InputError::UnknownModel(model.to_string()))?;

    let columns = feature_set.columns();
    let y = labels_of(&records)?;
    let data = Dataset::from_table(&table.select(&columns)?, y.clone(), groups_of(&records)?)?;
    let model_seed = seeds.derive(spec.short_name());
    let cv = cross_val_predict(&spec, &data, model_seed)?;
    let name = format!("{} ({})", spec.short_name(), feature_set);
    let bundle = ctx.evaluator().evaluate(&name, &y, &cv.probabilities)?;
    let analysis = rank_analysis(&records, &cv.probabilities, &ctx.settings.evaluation)?;
    let means = class_means(&table, &y, &columns)?;
    let importances = FittedModel::fit(&spec, &data, model_seed)?
        .ranked_importances()
        .map(|ranked| top_importances(&ranked, 15))
        .unwrap_or_default();

    let mut stdout = std::io::stdout().lock();
    report::write_bundles(&mut stdout, std::slice::from_ref(&bundle), OutputFormat::Table)?;
    writeln!(stdout)?;
    write!(stdout, "{}", report::render_rank_analysis(&analysis))?;
    writeln!(stdout, "\nClass means (positive / negative):")?;
    for m in &means {
        writeln!(
            stdout,
            "  {:<32} {:>10.4} {:>10.4}  ratio {:.3}",
            m.feature, m.positive_mean, m.negative_mean, m.ratio
        )?;
    }
    if !importances.is_empty() {
        writeln!(stdout, "\nTop features:")?;
        write!(stdout, "{}", report::render_importances(&importances))?;
    }

    let out_dir = ctx.output_dir(output_dir);
    report::write_json(
        &out_dir.join("analysis.json"),
        &serde_json::json!({
            "metrics": bundle,
            "ranking": analysis,
            "class_means": means,
            "importances": importances,
        }),
    )?;
    manifest.record_seeds(&seeds);
    manifest.write(&out_dir)?;
    Ok(())
}

fn handle_config(ctx: &Context, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(&ctx.settings)?);
            Ok(())
        }
        ConfigAction::Init => {
            let config_dir = ctx.workspace.join(".neoimmuno");
            std::fs::create_dir_all(&config_dir)?;
            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                warn!(path = %config_path.display(), "Configuration file already exists");
                return Ok(());
            }
            std::fs::write(&config_path, toml::to_string_pretty(&Settings::default())?)?;
            println!("Created default configuration at: {}", config_path.display());
            Ok(())
        }
    }
}
