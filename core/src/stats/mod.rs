//! Hypothesis testing
//!
//! Normality checks for the numeric variables and rank-based comparisons of
//! the exam score across the levels of a socioeconomic variable.

pub mod descriptive;
pub mod nonparametric;
pub mod normality;
pub mod rank;

use crate::data::columns;
use crate::data::frame::{float_values, has_column, present_floats, text_values};
use crate::error::{AnalysisError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub use nonparametric::{kruskal_wallis, mann_whitney_u};
pub use normality::{dagostino_pearson, shapiro_wilk};

/// Statistic and p-value of a hypothesis test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

impl TestOutcome {
    /// H0 is rejected when p <= alpha
    pub fn rejects(&self, alpha: f64) -> bool {
        self.p_value <= alpha
    }
}

/// Result of one normality test on one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityVerdict {
    pub outcome: Option<TestOutcome>,
    pub verdict: String,
}

impl NormalityVerdict {
    fn from_result(result: Result<TestOutcome>, alpha: f64) -> Self {
        match result {
            Ok(outcome) => {
                let verdict = if outcome.rejects(alpha) {
                    "Sample does not look Gaussian (H0 rejected)"
                } else {
                    "Sample looks Gaussian (H0 not rejected)"
                };
                Self {
                    outcome: Some(outcome),
                    verdict: verdict.to_string(),
                }
            }
            Err(e) => Self {
                outcome: None,
                verdict: format!("Not computed: {}", e),
            },
        }
    }
}

/// Normality results for one numeric variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityRow {
    pub variable: String,
    pub observations: usize,
    pub shapiro_wilk: NormalityVerdict,
    pub dagostino_k2: NormalityVerdict,
}

/// Run both normality tests on every numeric variable present in `frame`
pub fn normality_report(frame: &DataFrame, alpha: f64) -> Result<Vec<NormalityRow>> {
    let mut rows = Vec::new();

    for variable in columns::NUMERIC_COLUMNS {
        if !has_column(frame, variable) {
            debug!("Skipping normality tests for absent column {}", variable);
            continue;
        }

        let sample = present_floats(frame, variable)?;
        rows.push(NormalityRow {
            variable: variable.to_string(),
            observations: sample.len(),
            shapiro_wilk: NormalityVerdict::from_result(shapiro_wilk(&sample), alpha),
            dagostino_k2: NormalityVerdict::from_result(dagostino_pearson(&sample), alpha),
        });
    }

    info!("Normality tests completed for {} variables", rows.len());
    Ok(rows)
}

/// Which rank test a comparison used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupTest {
    MannWhitneyU,
    KruskalWallis,
}

/// Comparison of the target distribution across the levels of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupComparison {
    pub column: String,
    pub target: String,
    pub levels: usize,
    pub group_sizes: BTreeMap<String, usize>,
    pub test: GroupTest,
    pub outcome: TestOutcome,
    pub same_distribution: bool,
    pub verdict: String,
}

/// Compare `target` across the levels of `column`
///
/// Two levels use Mann-Whitney, three or more use Kruskal-Wallis. Rows with
/// a missing level or target are left out.
pub fn compare_groups(
    frame: &DataFrame,
    column: &str,
    target: &str,
    alpha: f64,
) -> Result<GroupComparison> {
    let labels = text_values(frame, column)?;
    let values = float_values(frame, target)?;

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (label, value) in labels.into_iter().zip(values) {
        if let (Some(label), Some(value)) = (label, value) {
            groups.entry(label).or_default().push(value);
        }
    }

    let levels = groups.len();
    if levels < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "column '{}' has {} level(s); at least 2 are needed",
            column, levels
        )));
    }

    let group_sizes = groups.iter().map(|(k, v)| (k.clone(), v.len())).collect();
    let samples: Vec<Vec<f64>> = groups.into_values().collect();

    let (test, outcome) = if levels == 2 {
        (GroupTest::MannWhitneyU, mann_whitney_u(&samples[0], &samples[1])?)
    } else {
        (GroupTest::KruskalWallis, kruskal_wallis(&samples)?)
    };

    let same_distribution = !outcome.rejects(alpha);
    let verdict = if same_distribution {
        "Same distribution (H0 not rejected)"
    } else {
        "Different distributions (H0 rejected)"
    };

    info!(
        column = column,
        levels = levels,
        p_value = outcome.p_value,
        "{}",
        verdict
    );

    Ok(GroupComparison {
        column: column.to_string(),
        target: target.to_string(),
        levels,
        group_sizes,
        test,
        outcome,
        same_distribution,
        verdict: verdict.to_string(),
    })
}
