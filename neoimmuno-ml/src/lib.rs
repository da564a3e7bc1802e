//! # neoimmuno-ml — evaluation, grouped cross-validation and scoring
//!
//! Everything in neoimmuno that learns, ranks or calls out to another process:
//!
//! - **Evaluation**: AUC-ROC, AUPRC, FR@k, TTIF@k and thresholded P/R/F1 with
//!   NaN-aware filtering
//! - **Training**: preprocessing fitted on training folds only, leave-one-group-out
//!   out-of-fold predictions, native classifiers
//! - **Scoring**: an async adapter over external presentation predictors
//! - **Benchmarks**: feature-set comparisons, baselines and IEDB transfer

// Foundation
pub mod config;
pub mod error;
pub mod runtime;

// Models and training
pub mod algorithms;
pub mod training;

// Evaluation
pub mod eval;

// Scoring and orchestration
pub mod benchmark;
pub mod scorer;
pub mod transfer;

// Re-exports
pub use algorithms::{Classifier, ModelSpec};
pub use benchmark::{Benchmark, BenchmarkReport, FeatureSet};
pub use config::{Settings, load_config};
pub use error::MlError;
pub use eval::{EvalConfig, Evaluator, MetricBundle, evaluate};
pub use runtime::PythonRuntime;
pub use scorer::{PresentationPredictor, ScoreRequest, ScorerAdapter};
pub use training::{CvPredictions, Dataset, FittedModel, cross_val_predict, leave_one_group_out};
pub use transfer::{TransferModel, TransferReport, run_transfer};
