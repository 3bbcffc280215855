//! Predictive models of the exam score
//!
//! A linear regression of the total score and a decision tree classifying
//! candidates above the median, both trained on the merged dataset with a
//! seeded train/test split.

pub mod metadata;
pub mod operations;
pub mod trainer;

use crate::config::ModelConfig;
use crate::error::{AnalysisError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use metadata::{ModelMetadata, ModelPerformanceMetrics, ModelType, TrainingResult};
pub use operations::{build_design_matrix, drop_constant_columns, train_test_split, DesignMatrix, Split};
pub use trainer::{train_decision_tree, train_linear_regression};

/// Results of training every model on one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrainingReport {
    pub target: String,
    pub samples: usize,
    pub seed: u64,
    pub test_fraction: f64,
    pub features: Vec<String>,
    pub linear_regression: TrainingResult,
    pub decision_tree: TrainingResult,
}

/// Build features, split and train both models
pub fn train_models(
    frame: &DataFrame,
    target: &str,
    categorical: &[String],
    config: &ModelConfig,
) -> Result<ModelTrainingReport> {
    let design = build_design_matrix(frame, target, categorical)?;
    let samples = design.target.len();

    let split = train_test_split(
        &design.features,
        &design.target,
        config.test_fraction,
        config.seed,
    )?;
    let (split, features) = drop_constant_columns(split, &design.feature_names);
    if features.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "every feature is constant on the training split".to_string(),
        ));
    }

    info!(
        "Training models on {} samples ({} train, {} test) with {} features",
        samples,
        split.y_train.len(),
        split.y_test.len(),
        features.len()
    );

    let linear_regression = train_linear_regression(&split, &features)?;
    let decision_tree =
        train_decision_tree(&split, config.tree_max_depth, config.tree_min_weight_split)?;

    Ok(ModelTrainingReport {
        target: target.to_string(),
        samples,
        seed: config.seed,
        test_fraction: config.test_fraction,
        features,
        linear_regression,
        decision_tree,
    })
}
