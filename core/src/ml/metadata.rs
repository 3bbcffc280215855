//! Model metadata types
//!
//! Metadata, metrics and results recorded for each trained model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Models trained on the merged dataset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ModelType {
    LinearRegression,
    DecisionTree,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LinearRegression => write!(f, "linear_regression"),
            ModelType::DecisionTree => write!(f, "decision_tree"),
        }
    }
}

/// Model metadata for tracking what was trained and on what
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: Uuid,
    pub name: String,
    pub model_type: ModelType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub features: usize,
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
    pub training_time_ms: u64,
    pub description: String,
}

impl ModelMetadata {
    pub fn new(model_type: ModelType, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: model_type.to_string(),
            model_type,
            created_at: chrono::Utc::now(),
            training_samples: 0,
            test_samples: 0,
            features: 0,
            hyperparameters: BTreeMap::new(),
            training_time_ms: 0,
            description: description.to_string(),
        }
    }
}

/// Metrics on the test split; only the ones relevant to the model are set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformanceMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mse: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2_score: Option<f64>,
}

/// Model training result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    pub metadata: ModelMetadata,
    pub test_metrics: ModelPerformanceMetrics,
    /// Linear regression coefficient per feature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
    /// Score above which a candidate is labelled positive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}
