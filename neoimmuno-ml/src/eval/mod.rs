//! Evaluation: metrics, the TESLA-style harness, comparison tables and error
//! analysis.

pub mod analysis;
pub mod comparison;
pub mod harness;
pub mod metrics;

pub use analysis::{
    ClassMeans, Detection, GroupMetrics, LengthRate, RankAnalysis, RankedRecord, class_means,
    per_group_metrics, rank_analysis, top_importances,
};
pub use comparison::ComparisonTable;
pub use harness::{EvalConfig, Evaluator, MetricBundle, evaluate};
pub use metrics::{ConfusionMatrix, average_precision, rank_order, roc_auc};
