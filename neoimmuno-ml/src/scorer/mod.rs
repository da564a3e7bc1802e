//! External presentation scorer adapter.
//!
//! A [`PresentationPredictor`] backend answers batches of (peptide, allele)
//! requests. [`ScorerAdapter`] validates requests, imposes a per-call
//! timeout and turns every failure into a typed [`ScoreFailure`] for that
//! record only. A failed record contributes a `NaN` triple downstream.

pub mod mhcflurry;
pub mod table;

pub use mhcflurry::MhcflurryPredictor;
pub use table::PrecomputedPredictor;

use crate::config::ScorerConfig;
use crate::error::MlError;
use async_trait::async_trait;
use neoimmuno_core::data::FeatureTable;
use neoimmuno_core::{Allele, PeptideRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Table columns written by [`add_score_columns`].
pub const SCORE_COLUMNS: [&str; 3] = [
    "mhcflurry_presentation",
    "mhcflurry_affinity",
    "mhcflurry_processing",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub peptide: String,
    pub allele: String,
}

impl ScoreRequest {
    pub fn new(peptide: impl Into<String>, allele: impl Into<String>) -> Self {
        Self {
            peptide: peptide.into(),
            allele: allele.into(),
        }
    }
}

impl From<&PeptideRecord> for ScoreRequest {
    fn from(record: &PeptideRecord) -> Self {
        Self::new(record.peptide.clone(), record.allele.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresentationScores {
    pub presentation: f64,
    pub affinity_nm: f64,
    pub processing: f64,
}

impl PresentationScores {
    /// The `NaN` triple a failed record contributes.
    pub fn missing() -> Self {
        Self {
            presentation: f64::NAN,
            affinity_nm: f64::NAN,
            processing: f64::NAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ScoreFailure {
    #[error("malformed allele '{0}'")]
    MalformedAllele(String),

    #[error("unsupported peptide length {0}")]
    UnsupportedLength(usize),

    #[error("predictor error: {0}")]
    Predictor(String),

    #[error("predictor timed out after {0}s")]
    Timeout(u64),
}

pub type ScoreOutcome = Result<PresentationScores, ScoreFailure>;

/// Scores or the `NaN` triple.
pub fn scores_or_missing(outcome: &ScoreOutcome) -> PresentationScores {
    outcome
        .as_ref()
        .copied()
        .unwrap_or_else(|_| PresentationScores::missing())
}

/// A backend that scores batches of validated requests.
#[async_trait]
pub trait PresentationPredictor: Send + Sync {
    fn name(&self) -> &str;

    /// One outcome per request, in request order. `Err` fails the whole
    /// batch.
    async fn predict(&self, batch: &[ScoreRequest]) -> Result<Vec<ScoreOutcome>, MlError>;
}

/// Validation, batching and timeout around a predictor backend.
#[derive(Clone)]
pub struct ScorerAdapter {
    predictor: Arc<dyn PresentationPredictor>,
    supported_lengths: Vec<usize>,
    batch_size: usize,
    timeout: Duration,
}

impl ScorerAdapter {
    pub fn new(predictor: Arc<dyn PresentationPredictor>, config: &ScorerConfig) -> Self {
        Self {
            predictor,
            supported_lengths: config.supported_lengths.clone(),
            batch_size: config.batch_size.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self, request: &ScoreRequest) -> Result<(), ScoreFailure> {
        Allele::parse(&request.allele)
            .map_err(|_| ScoreFailure::MalformedAllele(request.allele.clone()))?;
        let length = request.peptide.chars().count();
        if !self.supported_lengths.contains(&length) {
            return Err(ScoreFailure::UnsupportedLength(length));
        }
        Ok(())
    }

    /// Score every request. Never fails as a whole: each record gets its own
    /// outcome.
    pub async fn score_batch(&self, requests: &[ScoreRequest]) -> Vec<ScoreOutcome> {
        let mut outcomes: Vec<Option<ScoreOutcome>> = vec![None; requests.len()];
        let mut pending: Vec<usize> = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            match self.validate(request) {
                Ok(()) => pending.push(i),
                Err(failure) => outcomes[i] = Some(Err(failure)),
            }
        }

        for chunk in pending.chunks(self.batch_size) {
            let batch: Vec<ScoreRequest> = chunk.iter().map(|&i| requests[i].clone()).collect();
            let result = tokio::time::timeout(self.timeout, self.predictor.predict(&batch)).await;
            let chunk_outcomes: Vec<ScoreOutcome> = match result {
                Ok(Ok(scored)) if scored.len() == batch.len() => scored,
                Ok(Ok(scored)) => {
                    let failure = ScoreFailure::Predictor(format!(
                        "{} returned {} outcomes for {} requests",
                        self.predictor.name(),
                        scored.len(),
                        batch.len()
                    ));
                    vec![Err(failure); batch.len()]
                }
                Ok(Err(e)) => vec![Err(ScoreFailure::Predictor(e.to_string())); batch.len()],
                Err(_) => vec![Err(ScoreFailure::Timeout(self.timeout.as_secs())); batch.len()],
            };
            for (&i, outcome) in chunk.iter().zip(chunk_outcomes) {
                outcomes[i] = Some(outcome);
            }
        }

        let outcomes: Vec<ScoreOutcome> = outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| Err(ScoreFailure::Predictor("not scored".into()))))
            .collect();

        let mut n_failed = 0;
        for (request, outcome) in requests.iter().zip(&outcomes) {
            if let Err(failure) = outcome {
                n_failed += 1;
                warn!(
                    peptide = %request.peptide,
                    allele = %request.allele,
                    error = %failure,
                    "Scoring failed; using NaN scores"
                );
            }
        }
        info!(
            predictor = self.predictor.name(),
            requests = requests.len(),
            failed = n_failed,
            "Scoring complete"
        );
        outcomes
    }

    pub async fn score_records(&self, records: &[PeptideRecord]) -> Vec<ScoreOutcome> {
        let requests: Vec<ScoreRequest> = records.iter().map(ScoreRequest::from).collect();
        self.score_batch(&requests).await
    }
}

/// Append the three score columns, `NaN` for failed records.
pub fn add_score_columns(
    table: &mut FeatureTable,
    outcomes: &[ScoreOutcome],
) -> Result<(), MlError> {
    let scores: Vec<PresentationScores> = outcomes.iter().map(scores_or_missing).collect();
    table.add_column(
        SCORE_COLUMNS[0],
        scores.iter().map(|s| s.presentation).collect(),
    )?;
    table.add_column(SCORE_COLUMNS[1], scores.iter().map(|s| s.affinity_nm).collect())?;
    table.add_column(SCORE_COLUMNS[2], scores.iter().map(|s| s.processing).collect())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Presentation = length / 10; fails for peptides containing `X`.
    struct FakePredictor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PresentationPredictor for FakePredictor {
        fn name(&self) -> &str {
            "fake"
        }

        async fn predict(&self, batch: &[ScoreRequest]) -> Result<Vec<ScoreOutcome>, MlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(batch
                .iter()
                .map(|r| {
                    if r.peptide.contains('X') {
                        Err(ScoreFailure::Predictor("bad residue".into()))
                    } else {
                        Ok(PresentationScores {
                            presentation: r.peptide.len() as f64 / 10.0,
                            affinity_nm: 100.0,
                            processing: 0.5,
                        })
                    }
                })
                .collect())
        }
    }

    struct SlowPredictor;

    #[async_trait]
    impl PresentationPredictor for SlowPredictor {
        fn name(&self) -> &str {
            "slow"
        }

        async fn predict(&self, batch: &[ScoreRequest]) -> Result<Vec<ScoreOutcome>, MlError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![Ok(PresentationScores::missing()); batch.len()])
        }
    }

    struct BrokenPredictor;

    #[async_trait]
    impl PresentationPredictor for BrokenPredictor {
        fn name(&self) -> &str {
            "broken"
        }

        async fn predict(&self, _batch: &[ScoreRequest]) -> Result<Vec<ScoreOutcome>, MlError> {
            Err(MlError::Python("module not found".into()))
        }
    }

    fn config(batch_size: usize) -> ScorerConfig {
        ScorerConfig {
            batch_size,
            ..ScorerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_record() {
        let predictor = Arc::new(FakePredictor {
            calls: AtomicUsize::new(0),
        });
        let adapter = ScorerAdapter::new(predictor.clone(), &config(2));
        let requests = vec![
            ScoreRequest::new("SIINFEKL", "HLA-A*02:01"),
            ScoreRequest::new("SIINFEKL", "A*02:01"),
            ScoreRequest::new("SIINXEKL", "HLA-A*02:01"),
            ScoreRequest::new("SIINFEKLSIINFEKLS", "HLA-A*02:01"),
            ScoreRequest::new("GILGFVFTL", "HLA-A*02:01"),
        ];
        let outcomes = adapter.score_batch(&requests).await;

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[0].as_ref().unwrap().presentation, 0.8);
        assert_eq!(
            outcomes[1],
            Err(ScoreFailure::MalformedAllele("A*02:01".into()))
        );
        assert!(matches!(outcomes[2], Err(ScoreFailure::Predictor(_))));
        assert_eq!(outcomes[3], Err(ScoreFailure::UnsupportedLength(17)));
        assert_eq!(outcomes[4].as_ref().unwrap().presentation, 0.9);
        // Three valid requests in batches of two.
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_degrades_batch() {
        let adapter = ScorerAdapter::new(Arc::new(SlowPredictor), &config(8))
            .with_timeout(Duration::from_millis(20));
        let outcomes = adapter
            .score_batch(&[ScoreRequest::new("SIINFEKL", "HLA-A*02:01")])
            .await;
        assert_eq!(outcomes, vec![Err(ScoreFailure::Timeout(0))]);
    }

    #[tokio::test]
    async fn test_backend_error_degrades_batch() {
        let adapter = ScorerAdapter::new(Arc::new(BrokenPredictor), &config(8));
        let outcomes = adapter
            .score_batch(&[
                ScoreRequest::new("SIINFEKL", "HLA-A*02:01"),
                ScoreRequest::new("GILGFVFTL", "HLA-A*02:01"),
            ])
            .await;
        assert!(outcomes.iter().all(|o| matches!(o, Err(ScoreFailure::Predictor(_)))));
    }

    #[test]
    fn test_add_score_columns_uses_nan_for_failures() {
        let mut table = FeatureTable::new(2);
        let outcomes = vec![
            Ok(PresentationScores {
                presentation: 0.7,
                affinity_nm: 50.0,
                processing: 0.2,
            }),
            Err(ScoreFailure::Timeout(30)),
        ];
        add_score_columns(&mut table, &outcomes).unwrap();
        let presentation = table.column("mhcflurry_presentation").unwrap();
        assert_eq!(presentation[0], 0.7);
        assert!(presentation[1].is_nan());
        assert!(table.column("mhcflurry_affinity").unwrap()[1].is_nan());
    }
}
