//! neoimmuno CLI — feature engineering, evaluation and TESLA benchmarking.

mod commands;
mod report;

use clap::Parser;
use neoimmuno_ml::benchmark::FeatureSet;
use report::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// neoimmuno: position-aware neoantigen immunogenicity features and benchmarks
#[derive(Parser, Debug)]
#[command(name = "neoimmuno", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path (replaces the user and workspace files)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Input tables shared by most commands. Unset paths fall back to the
/// `[data]` section of the configuration.
#[derive(clap::Args, Debug, Clone, Default)]
struct Inputs {
    /// TESLA table (CSV)
    #[arg(long)]
    tesla: Option<PathBuf>,

    /// Precomputed presentation scores (CSV)
    #[arg(long)]
    scores: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Engineer position-aware features for every TESLA peptide
    Features {
        #[command(flatten)]
        inputs: Inputs,
        /// Output CSV (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate score columns of a CSV against a label column
    Evaluate {
        /// CSV with a label column and one or more score columns
        input: PathBuf,
        /// Label column
        #[arg(long, default_value = "immunogenic")]
        label: String,
        /// Score column to evaluate (repeatable)
        #[arg(long = "score", required = true)]
        scores: Vec<String>,
        /// Score columns where lower means more likely immunogenic
        #[arg(long = "invert")]
        inverted: Vec<String>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Score peptides with the external presentation predictor
    Score {
        #[command(flatten)]
        inputs: Inputs,
        /// Output CSV (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare baselines and feature sets with leave-one-patient-out CV
    Benchmark {
        #[command(flatten)]
        inputs: Inputs,
        /// IEDB assay table; enables the transfer score and the hybrid set
        #[arg(long)]
        iedb: Option<PathBuf>,
        /// Feature sets to run (default: all)
        #[arg(long = "feature-set", value_delimiter = ',')]
        feature_sets: Vec<FeatureSet>,
        /// Models to run: lr, rf, gb (default: all)
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        /// Run the live MHCflurry predictor when no score table is given
        #[arg(long)]
        live_scorer: bool,
        /// Results directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Train on IEDB sequence composition and score TESLA
    Transfer {
        #[command(flatten)]
        inputs: Inputs,
        /// IEDB assay table
        #[arg(long)]
        iedb: Option<PathBuf>,
        /// Also run the hybrid model (requires presentation scores)
        #[arg(long)]
        hybrid: bool,
        /// Results directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Error analysis of one model's out-of-fold ranking
    Analyze {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "tesla")]
        feature_set: FeatureSet,
        /// lr, rf or gb
        #[arg(long, default_value = "rf")]
        model: String,
        /// Results directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to the workspace
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "neoimmuno", "neoimmuno")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "neoimmuno.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
