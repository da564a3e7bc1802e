//! MHCflurry presentation predictor run through the Python runtime.

use super::{PresentationPredictor, PresentationScores, ScoreFailure, ScoreOutcome, ScoreRequest};
use crate::error::MlError;
use crate::runtime::PythonRuntime;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Reads `{"peptides": [...], "alleles": [...]}` and prints one result per
/// pair. Each pair is predicted on its own so one bad pair cannot sink the
/// batch; non-finite numbers become `null` because JSON has no `NaN`.
const PREDICT_SCRIPT: &str = r#"
import json, math, sys
from mhcflurry import Class1PresentationPredictor

def finite(v):
    v = float(v)
    return v if math.isfinite(v) else None

request = json.load(sys.stdin)
predictor = Class1PresentationPredictor.load()
results = []
for peptide, allele in zip(request["peptides"], request["alleles"]):
    try:
        pred = predictor.predict(peptides=[peptide], alleles=[allele], verbose=0)
        results.append({
            "presentation": finite(pred["presentation_score"].values[0]),
            "affinity": finite(pred["affinity"].values[0]),
            "processing": finite(pred["processing_score"].values[0]),
        })
    except Exception as e:
        results.append({"error": str(e)})
print(json.dumps({"results": results}))
"#;

#[derive(Debug, Deserialize)]
struct ScriptOutput {
    results: Vec<ScriptRecord>,
}

#[derive(Debug, Deserialize)]
struct ScriptRecord {
    #[serde(default)]
    presentation: Option<f64>,
    #[serde(default)]
    affinity: Option<f64>,
    #[serde(default)]
    processing: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl ScriptRecord {
    fn into_outcome(self) -> ScoreOutcome {
        if let Some(error) = self.error {
            return Err(ScoreFailure::Predictor(error));
        }
        Ok(PresentationScores {
            presentation: self.presentation.unwrap_or(f64::NAN),
            affinity_nm: self.affinity.unwrap_or(f64::NAN),
            processing: self.processing.unwrap_or(f64::NAN),
        })
    }
}

/// One Python subprocess per batch.
pub struct MhcflurryPredictor {
    runtime: PythonRuntime,
}

impl MhcflurryPredictor {
    pub fn new(runtime: PythonRuntime) -> Self {
        Self { runtime }
    }

    /// Whether the `mhcflurry` package imports in the configured interpreter.
    pub async fn is_available(&self) -> bool {
        self.runtime
            .check_packages(&["mhcflurry"])
            .await
            .get("mhcflurry")
            .copied()
            .unwrap_or(false)
    }
}

fn parse_output(value: serde_json::Value, expected: usize) -> Result<Vec<ScoreOutcome>, MlError> {
    let output: ScriptOutput = serde_json::from_value(value)
        .map_err(|e| MlError::Python(format!("Unexpected predictor output: {e}")))?;
    if output.results.len() != expected {
        return Err(MlError::Python(format!(
            "predictor returned {} results for {expected} requests",
            output.results.len()
        )));
    }
    Ok(output
        .results
        .into_iter()
        .map(ScriptRecord::into_outcome)
        .collect())
}

#[async_trait]
impl PresentationPredictor for MhcflurryPredictor {
    fn name(&self) -> &str {
        "mhcflurry"
    }

    async fn predict(&self, batch: &[ScoreRequest]) -> Result<Vec<ScoreOutcome>, MlError> {
        let input = json!({
            "peptides": batch.iter().map(|r| r.peptide.as_str()).collect::<Vec<_>>(),
            "alleles": batch.iter().map(|r| r.allele.as_str()).collect::<Vec<_>>(),
        });
        debug!(batch = batch.len(), "Calling MHCflurry");
        // The adapter owns the timeout; this one only guards direct use.
        let value = self.runtime.run_script(PREDICT_SCRIPT, &input, None).await?;
        parse_output(value, batch.len())
    }
}
