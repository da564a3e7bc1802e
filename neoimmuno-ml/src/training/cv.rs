//! Leave-one-group-out cross-validation.
//!
//! Folds are built over sorted group keys. Each fold refits the preprocessor
//! and a fresh classifier on the other groups, so the out-of-fold
//! probabilities never come from a model that saw the record's own group.

use super::Dataset;
use super::preprocess::{Preprocessor, log1p_mask};
use crate::algorithms::ModelSpec;
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One held-out group and the row indices on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub group: String,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSummary {
    pub group: String,
    pub n_train: usize,
    pub n_test: usize,
    pub n_test_positive: usize,
}

/// Out-of-fold probabilities, one per input row, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvPredictions {
    pub model: String,
    pub probabilities: Vec<f64>,
    pub folds: Vec<FoldSummary>,
    /// Mean over folds, for models that report importances.
    pub importances: Option<Vec<f64>>,
}

/// One fold per distinct group, in sorted group order.
pub fn leave_one_group_out<S: AsRef<str>>(groups: &[S]) -> Result<Vec<Fold>, MlError> {
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, g) in groups.iter().enumerate() {
        members.entry(g.as_ref()).or_default().push(i);
    }
    if members.len() < 2 {
        return Err(MlError::training(format!(
            "leave-one-group-out needs at least two groups, found {}",
            members.len()
        )));
    }

    Ok(members
        .into_iter()
        .map(|(group, test)| {
            let train = (0..groups.len())
                .filter(|&i| groups[i].as_ref() != group)
                .collect();
            Fold {
                group: group.to_string(),
                train,
                test,
            }
        })
        .collect())
}

fn gather<T: Clone>(values: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().map(|&i| values[i].clone()).collect()
}

/// Out-of-fold positive-class probabilities for every row of `data`.
///
/// Every fold's model is built from `spec` with the same `seed`.
pub fn cross_val_predict(
    spec: &ModelSpec,
    data: &Dataset,
    seed: u64,
) -> Result<CvPredictions, MlError> {
    let n = data.n_rows();
    if data.x.len() != n || data.groups.len() != n {
        return Err(MlError::dataset(format!(
            "{} rows, {} labels and {} group keys",
            data.x.len(),
            n,
            data.groups.len()
        )));
    }

    let folds = leave_one_group_out(&data.groups)?;
    let mask = log1p_mask(&data.columns);
    let mut probabilities = vec![f64::NAN; n];
    let mut summaries = Vec::with_capacity(folds.len());
    let mut importance_sum: Option<Vec<f64>> = None;

    for fold in &folds {
        if fold.test.is_empty() || fold.train.is_empty() {
            return Err(MlError::training(format!("fold '{}' is empty", fold.group)));
        }
        let y_train = gather(&data.y, &fold.train);
        let n_train_pos = y_train.iter().filter(|&&l| l).count();
        if n_train_pos == 0 || n_train_pos == y_train.len() {
            return Err(MlError::training(format!(
                "training side of fold '{}' contains a single class",
                fold.group
            )));
        }

        let (pre, x_train) = Preprocessor::fit_transform(&gather(&data.x, &fold.train), &mask)?;
        let x_test = pre.transform(&gather(&data.x, &fold.test))?;

        let mut model = spec.build(seed);
        model.fit(&x_train, &y_train)?;
        let fold_probs = model.predict_proba(&x_test)?;
        for (&row, p) in fold.test.iter().zip(fold_probs) {
            probabilities[row] = p;
        }

        if let Some(imp) = model.feature_importances() {
            match importance_sum.as_mut() {
                Some(acc) => acc.iter_mut().zip(&imp).for_each(|(a, v)| *a += v),
                None => importance_sum = Some(imp),
            }
        }

        let n_test_positive = fold.test.iter().filter(|&&i| data.y[i]).count();
        debug!(
            group = %fold.group,
            train = fold.train.len(),
            test = fold.test.len(),
            positives = n_test_positive,
            "Fold complete"
        );
        summaries.push(FoldSummary {
            group: fold.group.clone(),
            n_train: fold.train.len(),
            n_test: fold.test.len(),
            n_test_positive,
        });
    }

    let n_folds = folds.len() as f64;
    let importances = importance_sum.map(|mut v| {
        v.iter_mut().for_each(|x| *x /= n_folds);
        v
    });

    info!(
        model = spec.short_name(),
        folds = folds.len(),
        rows = n,
        "Leave-one-group-out predictions assembled"
    );
    Ok(CvPredictions {
        model: spec.short_name().to_string(),
        probabilities,
        folds: summaries,
        importances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::LogisticParams;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_folds_are_sorted_and_disjoint() {
        let groups = ["P2", "P1", "P2", "P3", "P1"];
        let folds = leave_one_group_out(&groups).unwrap();
        let names: Vec<&str> = folds.iter().map(|f| f.group.as_str()).collect();
        assert_eq!(names, vec!["P1", "P2", "P3"]);
        assert_eq!(folds[0].test, vec![1, 4]);
        assert_eq!(folds[0].train, vec![0, 2, 3]);
        for fold in &folds {
            assert!(fold.test.iter().all(|i| !fold.train.contains(i)));
        }
    }

    #[test]
    fn test_single_group_is_rejected() {
        assert!(leave_one_group_out(&["P1", "P1"]).is_err());
        assert!(leave_one_group_out::<&str>(&[]).is_err());
    }

    #[test]
    fn test_single_class_training_fold_is_rejected() {
        // Holding out P1 leaves only negatives to train on.
        let data = Dataset {
            columns: vec!["f".into()],
            x: vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            y: vec![true, false, false, true],
            groups: vec!["P1".into(), "P2".into(), "P2".into(), "P1".into()],
        };
        let spec = ModelSpec::LogisticRegression(LogisticParams::default());
        let err = cross_val_predict(&spec, &data, 0).unwrap_err();
        assert!(err.to_string().contains("P1"));
    }

    #[test]
    fn test_group_key_mismatch_is_rejected() {
        let data = Dataset {
            columns: vec!["f".into()],
            x: vec![vec![0.0], vec![1.0]],
            y: vec![true, false],
            groups: vec!["P1".into()],
        };
        let spec = ModelSpec::LogisticRegression(LogisticParams::default());
        assert!(cross_val_predict(&spec, &data, 0).is_err());
    }
}
