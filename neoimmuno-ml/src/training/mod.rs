//! Model training: datasets, per-fold preprocessing, grouped CV and run
//! reproducibility.

pub mod cv;
pub mod preprocess;
pub mod reproducibility;

pub use cv::{CvPredictions, Fold, FoldSummary, cross_val_predict, leave_one_group_out};
pub use preprocess::{LOG1P_COLUMNS, Preprocessor, log1p_mask};
pub use reproducibility::{RunManifest, SeedSequence, hash_file};

use crate::algorithms::{Classifier, ModelSpec};
use crate::error::MlError;
use neoimmuno_core::PeptideRecord;
use neoimmuno_core::data::FeatureTable;
use tracing::info;

/// Row-major design matrix with labels and group keys.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<bool>,
    pub groups: Vec<String>,
}

impl Dataset {
    pub fn from_table(
        table: &FeatureTable,
        y: Vec<bool>,
        groups: Vec<String>,
    ) -> Result<Self, MlError> {
        if y.len() != table.n_rows() {
            return Err(MlError::dataset(format!(
                "{} labels for {} rows",
                y.len(),
                table.n_rows()
            )));
        }
        if groups.len() != table.n_rows() {
            return Err(MlError::dataset(format!(
                "{} group keys for {} rows",
                groups.len(),
                table.n_rows()
            )));
        }
        Ok(Self {
            columns: table.column_names().to_vec(),
            x: table.to_rows(),
            y,
            groups,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    pub fn n_positive(&self) -> usize {
        self.y.iter().filter(|&&l| l).count()
    }
}

/// Labels of every record; an unlabeled record is a dataset error.
pub fn labels_of(records: &[PeptideRecord]) -> Result<Vec<bool>, MlError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.immunogenic
                .ok_or_else(|| MlError::dataset(format!("record {i} ({}) has no label", r.peptide)))
        })
        .collect()
}

/// Patient ids of every record; a record without one is a dataset error.
pub fn groups_of(records: &[PeptideRecord]) -> Result<Vec<String>, MlError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.patient_id.clone().ok_or_else(|| {
                MlError::dataset(format!("record {i} ({}) has no patient id", r.peptide))
            })
        })
        .collect()
}

/// A preprocessor and classifier fitted on one full dataset.
pub struct FittedModel {
    pub columns: Vec<String>,
    pub preprocessor: Preprocessor,
    pub model: Box<dyn Classifier>,
}

impl FittedModel {
    /// Fit on every row of `data`.
    pub fn fit(spec: &ModelSpec, data: &Dataset, seed: u64) -> Result<Self, MlError> {
        let (preprocessor, x) = Preprocessor::fit_transform(&data.x, &log1p_mask(&data.columns))?;
        let mut model = spec.build(seed);
        model.fit(&x, &data.y)?;
        info!(
            model = spec.short_name(),
            rows = data.n_rows(),
            features = data.columns.len(),
            "Fitted model on full dataset"
        );
        Ok(Self {
            columns: data.columns.clone(),
            preprocessor,
            model,
        })
    }

    /// Score a table that carries (at least) the training columns.
    pub fn predict_table(&self, table: &FeatureTable) -> Result<Vec<f64>, MlError> {
        let x = table.select(&self.columns)?.to_rows();
        self.model.predict_proba(&self.preprocessor.transform(&x)?)
    }

    /// Importances paired with column names, highest first.
    pub fn ranked_importances(&self) -> Option<Vec<(String, f64)>> {
        let importances = self.model.feature_importances()?;
        let mut ranked: Vec<(String, f64)> =
            self.columns.iter().cloned().zip(importances).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Some(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ForestParams;

    fn table() -> FeatureTable {
        let mut table = FeatureTable::new(40);
        table
            .add_column("signal", (0..40).map(|i| (i % 20) as f64).collect())
            .unwrap();
        table
            .add_column("noise", (0..40).map(|i| ((i * 7) % 5) as f64).collect())
            .unwrap();
        table
    }

    #[test]
    fn test_labels_and_groups_are_required() {
        let labeled = PeptideRecord::new("SIINFEKL", "HLA-A*02:01")
            .with_label(true)
            .with_patient("P1");
        assert_eq!(labels_of(&[labeled.clone()]).unwrap(), vec![true]);
        assert_eq!(groups_of(&[labeled]).unwrap(), vec!["P1".to_string()]);

        let bare = PeptideRecord::new("SIINFEKL", "HLA-A*02:01");
        assert!(labels_of(&[bare.clone()]).is_err());
        assert!(groups_of(&[bare]).is_err());
    }

    #[test]
    fn test_dataset_length_checks() {
        let t = table();
        assert!(Dataset::from_table(&t, vec![true; 39], vec!["a".into(); 40]).is_err());
        assert!(Dataset::from_table(&t, vec![true; 40], vec!["a".into(); 3]).is_err());
    }

    #[test]
    fn test_fitted_model_scores_and_ranks_importances() {
        let t = table();
        let y: Vec<bool> = (0..40).map(|i| i % 20 >= 14).collect();
        let data = Dataset::from_table(&t, y, vec!["g".into(); 40]).unwrap();
        let spec = ModelSpec::RandomForest(ForestParams {
            n_estimators: 20,
            min_samples_leaf: 2,
            ..ForestParams::default()
        });
        let fitted = FittedModel::fit(&spec, &data, 42).unwrap();

        let probs = fitted.predict_table(&t).unwrap();
        assert_eq!(probs.len(), 40);
        assert!(probs[19] > probs[0]);

        let ranked = fitted.ranked_importances().unwrap();
        assert_eq!(ranked[0].0, "signal");
    }
}
