//! Layered configuration for neoimmuno.
//!
//! Uses `figment`: defaults -> user config file -> workspace config file ->
//! environment -> explicit overrides. Files are read from
//! `~/.config/neoimmuno/config.toml` and `<workspace>/.neoimmuno/config.toml`.

use crate::algorithms::{BoostingParams, ForestParams, LogisticParams, ModelSpec};
use crate::eval::EvalConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use neoimmuno_core::data::DedupStrategy;
use neoimmuno_core::{DataConfig, PositionModel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Every configurable section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Anchor and TCR-contact tables.
    #[serde(default)]
    pub positions: PositionModel,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub evaluation: EvalConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// External presentation predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Python interpreter; `python3` on `PATH` when unset.
    #[serde(default)]
    pub python_path: Option<PathBuf>,
    /// Virtual environment whose interpreter takes precedence.
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
    /// Per-batch timeout for the predictor subprocess (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Peptide lengths the predictor accepts.
    #[serde(default = "default_supported_lengths")]
    pub supported_lengths: Vec<usize>,
    /// Records sent to the predictor per call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            venv_path: None,
            timeout_secs: default_timeout_secs(),
            supported_lengths: default_supported_lengths(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_supported_lengths() -> Vec<usize> {
    (5..=15).collect()
}

fn default_batch_size() -> usize {
    256
}

/// Classifier hyper-parameters and the run seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub logistic: LogisticParams,
    #[serde(default)]
    pub forest: ForestParams,
    #[serde(default)]
    pub boosting: BoostingParams,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            logistic: LogisticParams::default(),
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

impl ModelsConfig {
    /// LR, RF and GB in that order.
    pub fn specs(&self) -> Vec<ModelSpec> {
        vec![
            ModelSpec::LogisticRegression(self.logistic.clone()),
            ModelSpec::RandomForest(self.forest.clone()),
            ModelSpec::GradientBoosting(self.boosting.clone()),
        ]
    }
}

/// IEDB → TESLA transfer model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Restrict the pan-allele training set to one allele.
    #[serde(default)]
    pub allele: Option<String>,
    #[serde(default = "default_transfer_lengths")]
    pub lengths: Vec<usize>,
    #[serde(default)]
    pub strategy: DedupStrategy,
    #[serde(default = "default_transfer_forest")]
    pub forest: ForestParams,
    /// Allele for the allele-specific model, scored on the matching subset.
    #[serde(default = "default_specific_allele")]
    pub specific_allele: Option<String>,
    #[serde(default = "default_specific_lengths")]
    pub specific_lengths: Vec<usize>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            allele: None,
            lengths: default_transfer_lengths(),
            strategy: DedupStrategy::default(),
            forest: default_transfer_forest(),
            specific_allele: default_specific_allele(),
            specific_lengths: default_specific_lengths(),
        }
    }
}

fn default_transfer_lengths() -> Vec<usize> {
    vec![8, 9, 10, 11]
}

fn default_transfer_forest() -> ForestParams {
    ForestParams {
        max_depth: 8,
        min_samples_leaf: 10,
        ..ForestParams::default()
    }
}

fn default_specific_allele() -> Option<String> {
    Some("HLA-A*02:01".to_string())
}

fn default_specific_lengths() -> Vec<usize> {
    vec![9, 10]
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&Settings>,
) -> Result<Settings, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(Settings::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "neoimmuno", "neoimmuno") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".neoimmuno").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // NEOIMMUNO_EVALUATION__FR_TOP_K, NEOIMMUNO_SCORER__TIMEOUT_SECS, ...
    figment = figment.merge(Env::prefixed("NEOIMMUNO_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load from one explicit TOML file layered over the defaults.
pub fn load_config_file(path: &Path) -> Result<Settings, Box<figment::Error>> {
    Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file_exact(path))
        .merge(Env::prefixed("NEOIMMUNO_").split("__"))
        .extract()
        .map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.evaluation.fr_top_k, 100);
        assert_eq!(settings.evaluation.ttif_top_k, 20);
        assert_eq!(settings.models.seed, 42);
        assert_eq!(settings.models.forest.n_estimators, 500);
        assert_eq!(settings.transfer.forest.max_depth, 8);
        assert_eq!(settings.transfer.lengths, vec![8, 9, 10, 11]);
        assert_eq!(settings.scorer.timeout_secs, 300);
        assert_eq!(settings.positions, PositionModel::default());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = Settings::default();
        overrides.evaluation.fr_top_k = 50;
        overrides.models.seed = 7;

        let settings = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(settings.evaluation.fr_top_k, 50);
        assert_eq!(settings.models.seed, 7);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".neoimmuno");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[evaluation]
ttif_top_k = 10

[models.forest]
n_estimators = 50

[transfer]
strategy = "any_positive"

[positions]
fallback_anchors = [2, 10]
"#,
        )
        .unwrap();

        let settings = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(settings.evaluation.ttif_top_k, 10);
        assert_eq!(settings.evaluation.fr_top_k, 100);
        assert_eq!(settings.models.forest.n_estimators, 50);
        assert_eq!(settings.models.forest.max_depth, 5);
        assert_eq!(settings.transfer.strategy, DedupStrategy::AnyPositive);
        assert_eq!(settings.positions.fallback_anchors, vec![2, 10]);
    }

    #[test]
    fn test_load_config_file_missing_is_error() {
        assert!(load_config_file(Path::new("/nonexistent/neoimmuno.toml")).is_err());
    }

    #[test]
    fn test_model_specs_order() {
        let names: Vec<&str> = ModelsConfig::default()
            .specs()
            .iter()
            .map(ModelSpec::short_name)
            .collect();
        assert_eq!(names, vec!["LR", "RF", "GB"]);
    }

    #[test]
    fn test_settings_serde_roundtrip() {
        let settings = Settings::default();
        let json = serde_json::to_value(&settings).unwrap();
        let back: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(back.scorer.supported_lengths, settings.scorer.supported_lengths);
    }
}
