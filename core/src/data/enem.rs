//! ENEM microdata loading and preparation

use super::columns::{REQUIRED_ENEM_COLUMNS, SCHOOL_CODE, SCORE_COLUMNS, TOTAL_SCORE};
use super::frame::{
    csv_header, filter_rows, float_values, read_csv, set_float_column, set_text_column,
    text_values, CsvSource,
};
use crate::error::{AnalysisError, Result};
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{info, warn};

/// Field separator of the INEP microdata files
pub const ENEM_SEPARATOR: u8 = b';';

/// Read the ENEM microdata, projecting the needed columns
///
/// `extra_columns` are optional socioeconomic columns; the ones absent from
/// the file are skipped with a warning.
pub fn load_enem(
    path: &Path,
    extra_columns: &[String],
    max_rows: Option<usize>,
) -> Result<DataFrame> {
    let header = csv_header(path, ENEM_SEPARATOR)?;
    let present = |name: &str| header.iter().any(|h| h == name);

    let mut columns: Vec<String> = Vec::new();
    for name in REQUIRED_ENEM_COLUMNS.iter().chain(SCORE_COLUMNS.iter()) {
        if !present(name) {
            return Err(AnalysisError::MissingColumn(name.to_string()));
        }
        columns.push(name.to_string());
    }

    for name in extra_columns {
        if columns.contains(name) {
            continue;
        }
        if present(name) {
            columns.push(name.clone());
        } else {
            warn!("ENEM file has no column {}, skipping it", name);
        }
    }

    let df = read_csv(CsvSource {
        path,
        separator: ENEM_SEPARATOR,
        columns: Some(columns),
        max_rows,
    })?;

    info!(
        "Loaded {} ENEM rows and {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Drop absentees and replace the area scores by their mean
///
/// A candidate missing any area score did not sit every exam and is
/// removed. The school code becomes text so it can be joined with IDEB.
pub fn prepare_enem(df: &DataFrame) -> Result<DataFrame> {
    let scores = SCORE_COLUMNS
        .iter()
        .map(|name| float_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut keep = Vec::with_capacity(df.height());
    let mut totals = Vec::new();
    for row in 0..df.height() {
        let values: Option<Vec<f64>> = scores.iter().map(|column| column[row]).collect();
        match values {
            Some(values) => {
                keep.push(true);
                totals.push(Some(values.iter().sum::<f64>() / values.len() as f64));
            }
            None => keep.push(false),
        }
    }

    if totals.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "no ENEM candidate has all five area scores".to_string(),
        ));
    }

    let mut prepared = filter_rows(df, &keep)?;
    for name in SCORE_COLUMNS {
        prepared = prepared.drop(name)?;
    }
    set_float_column(&mut prepared, TOTAL_SCORE, totals)?;

    let keys = text_values(&prepared, SCHOOL_CODE)?;
    set_text_column(&mut prepared, SCHOOL_CODE, keys)?;

    info!(
        "ENEM preparation kept {} of {} candidates",
        prepared.height(),
        df.height()
    );
    Ok(prepared)
}
