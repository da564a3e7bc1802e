//! Data-location configuration shared by the loaders and the CLI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the benchmark inputs live.
///
/// All paths are optional so the CLI can supply them per invocation; a
/// command that needs a missing path reports it as a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// TESLA table (CSV export of Table S4, sheet `master-bindings-selected`).
    #[serde(default)]
    pub tesla_path: Option<PathBuf>,
    /// Pre-filtered IEDB human MHC-I T-cell assay table.
    #[serde(default)]
    pub iedb_path: Option<PathBuf>,
    /// Precomputed presentation scores (`peptide,allele,presentation,affinity,processing`).
    #[serde(default)]
    pub scores_path: Option<PathBuf>,
    /// Directory for feature tables, result bundles and run manifests.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".neoimmuno/results")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            tesla_path: None,
            iedb_path: None,
            scores_path: None,
            output_dir: default_output_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_config_serde_defaults() {
        let parsed: DataConfig = serde_json::from_str("{}").unwrap();
        assert!(parsed.tesla_path.is_none());
        assert_eq!(parsed.output_dir, PathBuf::from(".neoimmuno/results"));
    }
}
