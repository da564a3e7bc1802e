//! Presentation scores served from a precomputed CSV.

use super::{PresentationPredictor, PresentationScores, ScoreFailure, ScoreOutcome, ScoreRequest};
use crate::error::MlError;
use async_trait::async_trait;
use neoimmuno_core::data::parse_f64;
use neoimmuno_core::record::normalize_allele;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::info;

/// Lookup keyed by (peptide, allele).
#[derive(Debug, Clone, Default)]
pub struct PrecomputedPredictor {
    scores: HashMap<(String, String), PresentationScores>,
}

fn column_index(headers: &csv::StringRecord, names: &[&str]) -> Result<usize, MlError> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim()))
        .ok_or_else(|| MlError::dataset(format!("score table has no '{}' column", names[0])))
}

impl PrecomputedPredictor {
    pub fn from_path(path: &Path) -> Result<Self, MlError> {
        let file = std::fs::File::open(path)?;
        let predictor = Self::from_reader(file)?;
        info!(path = %path.display(), pairs = predictor.len(), "Loaded precomputed scores");
        Ok(predictor)
    }

    /// Columns `peptide, allele, presentation, affinity, processing`; the
    /// `mhcflurry_` prefixed names are accepted too.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, MlError> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let peptide = column_index(&headers, &["peptide"])?;
        let allele = column_index(&headers, &["allele"])?;
        let presentation = column_index(&headers, &["presentation", "mhcflurry_presentation"])?;
        let affinity = column_index(&headers, &["affinity", "mhcflurry_affinity"])?;
        let processing = column_index(&headers, &["processing", "mhcflurry_processing"])?;

        let mut scores = HashMap::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("").trim();
            let key = (field(peptide).to_string(), normalize_allele(field(allele)));
            let value = PresentationScores {
                presentation: parse_f64(field(presentation), row, "presentation")?,
                affinity_nm: parse_f64(field(affinity), row, "affinity")?,
                processing: parse_f64(field(processing), row, "processing")?,
            };
            scores.insert(key, value);
        }
        Ok(Self { scores })
    }

    pub fn insert(&mut self, request: ScoreRequest, scores: PresentationScores) {
        self.scores.insert((request.peptide, request.allele), scores);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[async_trait]
impl PresentationPredictor for PrecomputedPredictor {
    fn name(&self) -> &str {
        "precomputed"
    }

    async fn predict(&self, batch: &[ScoreRequest]) -> Result<Vec<ScoreOutcome>, MlError> {
        Ok(batch
            .iter()
            .map(|r| {
                self.scores
                    .get(&(r.peptide.clone(), r.allele.clone()))
                    .copied()
                    .ok_or_else(|| {
                        ScoreFailure::Predictor(format!(
                            "no precomputed score for {} / {}",
                            r.peptide, r.allele
                        ))
                    })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
peptide,allele,mhcflurry_presentation,mhcflurry_affinity,mhcflurry_processing
SIINFEKL,A*02:01,0.9,25.0,0.6
GILGFVFTL,HLA-A*02:01,NA,1200.5,0.1
";

    #[tokio::test]
    async fn test_lookup_and_missing_pairs() {
        let predictor = PrecomputedPredictor::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(predictor.len(), 2);

        let outcomes = predictor
            .predict(&[
                ScoreRequest::new("SIINFEKL", "HLA-A*02:01"),
                ScoreRequest::new("GILGFVFTL", "HLA-A*02:01"),
                ScoreRequest::new("NLVPMVATV", "HLA-A*02:01"),
            ])
            .await
            .unwrap();
        assert_eq!(outcomes[0].as_ref().unwrap().presentation, 0.9);
        assert!(outcomes[1].as_ref().unwrap().presentation.is_nan());
        assert_eq!(outcomes[1].as_ref().unwrap().affinity_nm, 1200.5);
        assert!(matches!(outcomes[2], Err(ScoreFailure::Predictor(_))));
    }

    #[test]
    fn test_missing_column_is_dataset_error() {
        let err = PrecomputedPredictor::from_reader("peptide,allele\nA,B\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[test]
    fn test_unparsable_score_is_error() {
        let csv = "peptide,allele,presentation,affinity,processing\nSIINFEKL,HLA-A*02:01,high,1,1\n";
        assert!(PrecomputedPredictor::from_reader(csv.as_bytes()).is_err());
    }
}
