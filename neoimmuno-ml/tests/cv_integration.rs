//! Leave-one-group-out cross-validation over a patient-grouped table.

use neoimmuno_core::data::FeatureTable;
use neoimmuno_ml::algorithms::{ForestParams, LogisticParams, ModelSpec};
use neoimmuno_ml::training::{Dataset, FittedModel, cross_val_predict, leave_one_group_out};
use neoimmuno_ml::{MlError, evaluate};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const N: usize = 60;

fn labels() -> Vec<bool> {
    (0..N).map(|i| i % 4 == 0).collect()
}

fn groups() -> Vec<String> {
    (0..N).map(|i| format!("P{}", i % 3 + 1)).collect()
}

fn table() -> FeatureTable {
    let y = labels();
    let mut table = FeatureTable::new(N);
    table
        .add_column(
            "binding_stability",
            (0..N)
                .map(|i| if y[i] { 2.0 } else { 0.5 } + (i % 7) as f64 * 0.1)
                .collect(),
        )
        .unwrap();
    table
        .add_column(
            "tumor_abundance",
            (0..N)
                .map(|i| if i % 9 == 0 { f64::NAN } else { (i * 13 % 50) as f64 })
                .collect(),
        )
        .unwrap();
    table
}

fn dataset() -> Dataset {
    Dataset::from_table(&table(), labels(), groups()).unwrap()
}

#[test]
fn held_out_folds_partition_the_rows() {
    let folds = leave_one_group_out(&groups()).unwrap();
    assert_eq!(
        folds.iter().map(|f| f.group.as_str()).collect::<Vec<_>>(),
        vec!["P1", "P2", "P3"]
    );

    let mut seen = BTreeSet::new();
    for fold in &folds {
        for &i in &fold.test {
            assert!(seen.insert(i), "row {i} held out twice");
            assert_eq!(groups()[i], fold.group);
        }
        assert!(fold.train.iter().all(|&i| groups()[i] != fold.group));
        assert_eq!(fold.train.len() + fold.test.len(), N);
    }
    assert_eq!(seen.len(), N);
}

#[test]
fn out_of_fold_scores_come_from_other_groups() {
    let spec = ModelSpec::LogisticRegression(LogisticParams::default());
    let data = dataset();
    let cv = cross_val_predict(&spec, &data, 42).unwrap();
    assert_eq!(cv.probabilities.len(), N);
    assert!(cv.probabilities.iter().all(|p| p.is_finite()));

    // Refit by hand on P2 and P3 only; P1's out-of-fold scores must match.
    let train: Vec<usize> = (0..N).filter(|&i| data.groups[i] != "P1").collect();
    let test: Vec<usize> = (0..N).filter(|&i| data.groups[i] == "P1").collect();
    let train_data = Dataset {
        columns: data.columns.clone(),
        x: train.iter().map(|&i| data.x[i].clone()).collect(),
        y: train.iter().map(|&i| data.y[i]).collect(),
        groups: train.iter().map(|&i| data.groups[i].clone()).collect(),
    };
    let fitted = FittedModel::fit(&spec, &train_data, 42).unwrap();
    let manual = fitted.predict_table(&table().take_rows(&test)).unwrap();
    for (&row, expected) in test.iter().zip(manual) {
        assert!((cv.probabilities[row] - expected).abs() < 1e-9);
    }
}

#[test]
fn forest_cv_is_reproducible_and_informative() {
    let spec = ModelSpec::RandomForest(ForestParams {
        n_estimators: 25,
        ..ForestParams::default()
    });
    let a = cross_val_predict(&spec, &dataset(), 7).unwrap();
    let b = cross_val_predict(&spec, &dataset(), 7).unwrap();
    assert_eq!(a.probabilities, b.probabilities);
    assert_eq!(a.folds.len(), 3);
    assert_eq!(a.importances.as_ref().map(Vec::len), Some(2));

    let bundle = evaluate("RF", &labels(), &a.probabilities).unwrap();
    assert!(bundle.auc_roc > 0.9, "AUC {}", bundle.auc_roc);
}

#[test]
fn single_group_is_rejected() {
    let data = Dataset::from_table(&table(), labels(), vec!["P1".to_string(); N]).unwrap();
    let spec = ModelSpec::LogisticRegression(LogisticParams::default());
    let err = cross_val_predict(&spec, &data, 42).unwrap_err();
    assert!(matches!(err, MlError::Training(_)));
}

#[test]
fn single_class_training_side_is_rejected() {
    // All positives live in P1, so the fold holding out P1 trains on negatives only.
    let y: Vec<bool> = (0..N).map(|i| i % 3 == 0 && i % 2 == 0).collect();
    let data = Dataset::from_table(&table(), y, groups()).unwrap();
    let spec = ModelSpec::LogisticRegression(LogisticParams::default());
    let err = cross_val_predict(&spec, &data, 42).unwrap_err();
    assert!(err.to_string().contains("P1"));
}
