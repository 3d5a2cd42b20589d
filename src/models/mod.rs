//! Classification and scoring

pub mod evaluation;
pub mod knn;
pub mod metrics;
pub mod report;

pub use evaluation::{
    BinaryOutcome, ConfusionMatrix, Evaluation, LabelScores, Outcome, ViewScores,
};
pub use knn::{
    majority_vote, nearest, ClassificationRun, ClassifierState, KnnClassifier, RunOutcome,
};
pub use metrics::Metric;
pub use report::{Report, ReportWriter};
