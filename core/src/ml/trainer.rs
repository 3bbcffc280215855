//! Model training and evaluation

use super::metadata::{ModelMetadata, ModelPerformanceMetrics, ModelType, TrainingResult};
use super::operations::Split;
use crate::error::{AnalysisError, Result};
use crate::stats::descriptive::median;
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use linfa_trees::DecisionTree;
use ndarray::Array1;
use std::time::Instant;
use tracing::info;

/// Fit an ordinary least squares regression of the target
pub fn train_linear_regression(split: &Split, feature_names: &[String]) -> Result<TrainingResult> {
    info!(
        "Starting Linear Regression training with {} samples and {} features",
        split.x_train.nrows(),
        split.x_train.ncols()
    );

    if split.x_train.nrows() <= split.x_train.ncols() {
        return Err(AnalysisError::InsufficientData(format!(
            "Linear regression requires more samples than features: {} samples, {} features",
            split.x_train.nrows(),
            split.x_train.ncols()
        )));
    }

    let start = Instant::now();
    let dataset = Dataset::new(split.x_train.clone(), split.y_train.clone());
    let model = LinearRegression::default()
        .fit(&dataset)
        .map_err(|e| AnalysisError::Model(format!("Linear regression training failed: {}", e)))?;
    let training_time_ms = start.elapsed().as_millis() as u64;

    let predictions = model.predict(&split.x_test);
    let test_metrics = regression_metrics(&predictions, &split.y_test);

    let coefficients = feature_names
        .iter()
        .cloned()
        .zip(model.params().iter().copied())
        .collect();

    let mut metadata = ModelMetadata::new(
        ModelType::LinearRegression,
        "Ordinary least squares regression of the total score",
    );
    metadata.training_samples = split.x_train.nrows();
    metadata.test_samples = split.x_test.nrows();
    metadata.features = split.x_train.ncols();
    metadata.training_time_ms = training_time_ms;
    metadata
        .hyperparameters
        .insert("fit_intercept".to_string(), serde_json::Value::from(true));

    info!(
        r2 = test_metrics.r2_score,
        mse = test_metrics.mse,
        "Linear regression training completed"
    );

    Ok(TrainingResult {
        metadata,
        test_metrics,
        coefficients: Some(coefficients),
        intercept: Some(model.intercept()),
        threshold: None,
    })
}

/// Fit a decision tree classifying candidates above the training median
pub fn train_decision_tree(
    split: &Split,
    max_depth: usize,
    min_weight_split: f32,
) -> Result<TrainingResult> {
    info!(
        "Starting Decision Tree training with {} samples and {} features",
        split.x_train.nrows(),
        split.x_train.ncols()
    );

    let threshold = median(&split.y_train.to_vec()).ok_or_else(|| {
        AnalysisError::InsufficientData("empty training split".to_string())
    })?;
    let train_labels = above(&split.y_train, threshold);
    let test_labels = above(&split.y_test, threshold);

    let start = Instant::now();
    let dataset = Dataset::new(split.x_train.clone(), train_labels);
    let model = DecisionTree::params()
        .max_depth(Some(max_depth))
        .min_weight_split(min_weight_split)
        .fit(&dataset)
        .map_err(|e| AnalysisError::Model(format!("Decision tree training failed: {}", e)))?;
    let training_time_ms = start.elapsed().as_millis() as u64;

    let predictions: Array1<usize> = model.predict(&split.x_test);
    let test_metrics = classification_metrics(&predictions, &test_labels);

    let mut metadata = ModelMetadata::new(
        ModelType::DecisionTree,
        "Decision tree classifier of scores above the training median",
    );
    metadata.training_samples = split.x_train.nrows();
    metadata.test_samples = split.x_test.nrows();
    metadata.features = split.x_train.ncols();
    metadata.training_time_ms = training_time_ms;
    metadata
        .hyperparameters
        .insert("max_depth".to_string(), serde_json::Value::from(max_depth));
    metadata.hyperparameters.insert(
        "min_weight_split".to_string(),
        serde_json::Value::from(min_weight_split),
    );

    info!(
        accuracy = test_metrics.accuracy,
        f1 = test_metrics.f1_score,
        "Decision tree training completed"
    );

    Ok(TrainingResult {
        metadata,
        test_metrics,
        coefficients: None,
        intercept: None,
        threshold: Some(threshold),
    })
}

fn above(values: &Array1<f64>, threshold: f64) -> Array1<usize> {
    values.mapv(|v| usize::from(v > threshold))
}

/// Accuracy, precision, recall and F1 of binary predictions (1 is positive)
pub fn classification_metrics(
    predictions: &Array1<usize>,
    targets: &Array1<usize>,
) -> ModelPerformanceMetrics {
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut tn = 0.0;
    let mut fn_ = 0.0;

    for (&pred, &actual) in predictions.iter().zip(targets.iter()) {
        match (pred == 1, actual == 1) {
            (true, true) => tp += 1.0,
            (true, false) => fp += 1.0,
            (false, false) => tn += 1.0,
            (false, true) => fn_ += 1.0,
        }
    }

    let total = tp + fp + tn + fn_;
    let accuracy = if total > 0.0 { (tp + tn) / total } else { 0.0 };
    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ModelPerformanceMetrics {
        accuracy: Some(accuracy),
        precision: Some(precision),
        recall: Some(recall),
        f1_score: Some(f1_score),
        ..Default::default()
    }
}

/// MSE, MAE and R² of regression predictions
pub fn regression_metrics(
    predictions: &Array1<f64>,
    targets: &Array1<f64>,
) -> ModelPerformanceMetrics {
    let n = predictions.len() as f64;
    let target_mean = targets.sum() / n;

    let mut residual_sum_squares = 0.0;
    let mut mae = 0.0;
    let mut total_sum_squares = 0.0;

    for (&pred, &actual) in predictions.iter().zip(targets.iter()) {
        let error = pred - actual;
        residual_sum_squares += error * error;
        mae += error.abs();
        total_sum_squares += (actual - target_mean) * (actual - target_mean);
    }

    let r2_score = if total_sum_squares > 0.0 {
        1.0 - residual_sum_squares / total_sum_squares
    } else {
        0.0
    };

    ModelPerformanceMetrics {
        mse: Some(residual_sum_squares / n),
        mae: Some(mae / n),
        r2_score: Some(r2_score),
        ..Default::default()
    }
}

/// Coefficients sorted by absolute size, largest first
pub fn ranked_coefficients(result: &TrainingResult) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = result
        .coefficients
        .as_ref()
        .map(|c| c.iter().map(|(k, v)| (k.clone(), *v)).collect())
        .unwrap_or_default();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn linear_split() -> Split {
        let x = |rows: std::ops::Range<usize>| {
            Array2::from_shape_fn((rows.len(), 2), |(i, j)| {
                let i = (i + rows.start) as f64;
                if j == 0 {
                    i
                } else {
                    (i * 7.0) % 5.0
                }
            })
        };
        let y = |x: &Array2<f64>| -> Array1<f64> {
            x.rows().into_iter().map(|r| 3.0 + 2.0 * r[0] - r[1]).collect()
        };

        let x_train = x(0..30);
        let x_test = x(30..40);
        Split {
            y_train: y(&x_train),
            y_test: y(&x_test),
            x_train,
            x_test,
        }
    }

    #[test]
    fn test_linear_regression_recovers_coefficients() {
        let names = vec!["a".to_string(), "b".to_string()];
        let result = train_linear_regression(&linear_split(), &names).unwrap();

        let coefficients = result.coefficients.as_ref().unwrap();
        assert!((coefficients["a"] - 2.0).abs() < 1e-6);
        assert!((coefficients["b"] + 1.0).abs() < 1e-6);
        assert!((result.intercept.unwrap() - 3.0).abs() < 1e-6);
        assert!(result.test_metrics.r2_score.unwrap() > 0.999_999);
        assert!(result.test_metrics.mse.unwrap() < 1e-8);
        assert!(result.test_metrics.accuracy.is_none());

        assert_eq!(result.metadata.model_type, ModelType::LinearRegression);
        assert_eq!(result.metadata.training_samples, 30);
        assert_eq!(result.metadata.test_samples, 10);

        let ranked = ranked_coefficients(&result);
        assert_eq!(ranked[0].0, "a");
    }

    #[test]
    fn test_linear_regression_needs_more_rows_than_features() {
        let split = Split {
            x_train: array![[1.0, 2.0], [2.0, 1.0]],
            x_test: array![[1.0, 1.0]],
            y_train: array![1.0, 2.0],
            y_test: array![1.0],
        };
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            train_linear_regression(&split, &names),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_decision_tree_labels_by_training_median() {
        let result = train_decision_tree(&linear_split(), 4, 2.0).unwrap();
        let threshold = result.threshold.unwrap();
        assert_eq!(threshold, median(&linear_split().y_train.to_vec()).unwrap());

        let metrics = &result.test_metrics;
        for value in [metrics.accuracy, metrics.precision, metrics.recall, metrics.f1_score] {
            let value = value.unwrap();
            assert!((0.0..=1.0).contains(&value));
        }
        assert!(metrics.mse.is_none());
        assert_eq!(result.metadata.hyperparameters["max_depth"], serde_json::json!(4));
    }

    #[test]
    fn test_classification_metrics() {
        let predictions = array![1, 1, 0, 0, 1];
        let targets = array![1, 0, 0, 1, 1];
        let metrics = classification_metrics(&predictions, &targets);
        assert_eq!(metrics.accuracy, Some(0.6));
        assert!((metrics.precision.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.recall.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.f1_score.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_regression_metrics() {
        let predictions = array![1.0, 2.0, 3.0, 5.0];
        let targets = array![1.0, 2.0, 3.0, 4.0];
        let metrics = regression_metrics(&predictions, &targets);
        assert_eq!(metrics.mse, Some(0.25));
        assert_eq!(metrics.mae, Some(0.25));
        // ss_tot = 5, ss_res = 1
        assert!((metrics.r2_score.unwrap() - 0.8).abs() < 1e-12);
    }
}
