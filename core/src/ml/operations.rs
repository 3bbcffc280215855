//! Feature matrix construction and data splitting

use crate::data::columns::NUMERIC_COLUMNS;
use crate::data::frame::{float_values, has_column, text_values};
use crate::error::{AnalysisError, Result};
use crate::stats::descriptive::median;
use itertools::Itertools;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, warn};

/// Features and target extracted from the merged frame
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub features: Array2<f64>,
    pub target: Array1<f64>,
    pub feature_names: Vec<String>,
}

/// Build the model inputs from `frame`
///
/// Numeric columns are used as they are, missing values replaced by the
/// column median. Each categorical column is one-hot encoded with its first
/// level (in sorted order) dropped; a missing label encodes as all zeros.
/// Rows without a target value are left out.
pub fn build_design_matrix(
    frame: &DataFrame,
    target: &str,
    categorical: &[String],
) -> Result<DesignMatrix> {
    let target_values = float_values(frame, target)?;
    let rows: Vec<usize> = target_values
        .iter()
        .positions(|v| v.is_some())
        .collect();
    if rows.is_empty() {
        return Err(AnalysisError::InsufficientData(format!(
            "no row has a value for '{}'",
            target
        )));
    }

    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();

    for name in NUMERIC_COLUMNS {
        if name == target || !has_column(frame, name) {
            continue;
        }
        let values = float_values(frame, name)?;
        let values: Vec<Option<f64>> = rows.iter().map(|&i| values[i]).collect();
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        match median(&observed) {
            Some(fill) => {
                columns.push((name.to_string(), values.iter().map(|v| v.unwrap_or(fill)).collect()))
            }
            None => warn!("Feature {} has no values, leaving it out", name),
        }
    }

    for name in categorical {
        if name == target || !has_column(frame, name) {
            continue;
        }
        let labels = text_values(frame, name)?;
        let labels: Vec<Option<String>> = rows.iter().map(|&i| labels[i].clone()).collect();
        columns.extend(one_hot(name, &labels));
    }

    if columns.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "no usable feature columns".to_string(),
        ));
    }

    let features = Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| columns[j].1[i]);
    let target: Array1<f64> = target_values.iter().flatten().copied().collect();
    let feature_names = columns.into_iter().map(|(name, _)| name).collect();

    debug!(
        "Design matrix: {} rows, {} features",
        features.nrows(),
        features.ncols()
    );
    Ok(DesignMatrix {
        features,
        target,
        feature_names,
    })
}

/// Indicator columns for every level but the first
fn one_hot(name: &str, labels: &[Option<String>]) -> Vec<(String, Vec<f64>)> {
    let levels: Vec<&String> = labels.iter().flatten().unique().sorted().collect();
    if levels.len() < 2 {
        debug!("Column {} has fewer than two levels, not encoded", name);
        return Vec::new();
    }

    levels
        .iter()
        .skip(1)
        .map(|level| {
            let indicator = labels
                .iter()
                .map(|l| if l.as_ref() == Some(*level) { 1.0 } else { 0.0 })
                .collect();
            (format!("{}={}", name, level), indicator)
        })
        .collect()
}

/// Train and test partitions of a design matrix
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Shuffle rows with a seeded generator and hold out `test_fraction` of them
///
/// The test split has at least one row and leaves at least one for training.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_fraction: f64,
    seed: u64,
) -> Result<Split> {
    let n_samples = x.nrows();
    if n_samples != y.len() {
        return Err(AnalysisError::Model(format!(
            "Features and targets must have same number of samples: {} vs {}",
            n_samples,
            y.len()
        )));
    }
    if n_samples < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "cannot split {} sample(s) into train and test sets",
            n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_samples as f64 * test_fraction).round() as usize).clamp(1, n_samples - 1);
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(Split {
        x_train: x.select(Axis(0), train_idx),
        x_test: x.select(Axis(0), test_idx),
        y_train: y.select(Axis(0), train_idx),
        y_test: y.select(Axis(0), test_idx),
    })
}

/// Remove features that are constant on the training rows
///
/// Returns the reduced split and the names of the kept features.
pub fn drop_constant_columns(split: Split, names: &[String]) -> (Split, Vec<String>) {
    let keep: Vec<usize> = split
        .x_train
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, column)| column.iter().any(|v| *v != column[0]))
        .map(|(j, _)| j)
        .collect();

    if keep.len() == names.len() {
        return (split, names.to_vec());
    }

    let dropped = names
        .iter()
        .enumerate()
        .filter(|(j, _)| !keep.contains(j))
        .map(|(_, n)| n.as_str())
        .join(", ");
    debug!("Dropping features constant on the training split: {}", dropped);

    let kept_names = keep.iter().map(|&j| names[j].clone()).collect();
    let split = Split {
        x_train: split.x_train.select(Axis(1), &keep),
        x_test: split.x_test.select(Axis(1), &keep),
        y_train: split.y_train,
        y_test: split.y_test,
    };
    (split, kept_names)
}
