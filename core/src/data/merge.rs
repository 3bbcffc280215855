//! ENEM x IDEB merge and imputation

use super::columns::{
    is_numeric, AGE, IDEB, MARITAL_STATUS, PASS_RATE, SCHOOLING_TYPE, SCHOOL_CODE,
    STANDARDIZED_SCORE, STATE_OF_RESIDENCE,
};
use super::frame::{
    column_names, drop_if_present, filter_rows, float_values, read_csv, require_column,
    set_float_column, set_text_column, text_values, write_csv, CsvSource,
};
use crate::error::Result;
use crate::stats::descriptive::{median, mode};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Join ENEM candidates with the IDEB index of their school and impute gaps
///
/// - left join on `CO_ESCOLA`, then the key is dropped
/// - `IDEB` and `NT_PADRONIZADA` are dropped (mostly missing)
/// - missing age: median age
/// - missing marital status / schooling type: the mode
/// - missing pass rate: median of the candidate's state, else global median
/// - numeric columns become floats, every other column text
pub fn merge_datasets(enem: &DataFrame, ideb: &DataFrame) -> Result<DataFrame> {
    let enem = with_text_key(enem)?;
    let ideb = unique_schools(&with_text_key(ideb)?)?;

    let mut merged = enem.left_join(&ideb, [SCHOOL_CODE], [SCHOOL_CODE])?;
    debug!("Joined frame has {} rows", merged.height());

    for column in [SCHOOL_CODE, IDEB, STANDARDIZED_SCORE] {
        merged = drop_if_present(merged, column)?;
    }

    impute_median(&mut merged, AGE)?;
    impute_mode(&mut merged, MARITAL_STATUS)?;
    impute_mode(&mut merged, SCHOOLING_TYPE)?;
    impute_group_median(&mut merged, PASS_RATE, STATE_OF_RESIDENCE)?;
    conform_types(&mut merged)?;

    info!(
        "Merged dataset ready: {} rows, {} columns",
        merged.height(),
        merged.width()
    );
    Ok(merged)
}

fn with_text_key(df: &DataFrame) -> Result<DataFrame> {
    let mut df = df.clone();
    let keys = text_values(&df, SCHOOL_CODE)?;
    set_text_column(&mut df, SCHOOL_CODE, keys)?;
    Ok(df)
}

/// Keep the first row of each school so the join cannot duplicate candidates
fn unique_schools(ideb: &DataFrame) -> Result<DataFrame> {
    let keys = text_values(ideb, SCHOOL_CODE)?;
    let mut seen = HashSet::new();
    let keep: Vec<bool> = keys
        .iter()
        .map(|k| match k {
            Some(k) => seen.insert(k.clone()),
            None => false,
        })
        .collect();

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        warn!("Ignoring {} IDEB rows with a repeated or empty school code", dropped);
    }
    filter_rows(ideb, &keep)
}

fn impute_median(df: &mut DataFrame, column: &str) -> Result<()> {
    let values = float_values(df, column)?;
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(fill) = median(&observed) else {
        warn!("Column {} has no observed values to impute from", column);
        return Ok(());
    };

    let missing = values.iter().filter(|v| v.is_none()).count();
    debug!("Imputing {} missing {} values with median {}", missing, column, fill);
    let filled = values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
    set_float_column(df, column, filled)
}

fn impute_mode(df: &mut DataFrame, column: &str) -> Result<()> {
    let values = text_values(df, column)?;
    let Some(fill) = mode(values.iter().flatten().map(String::as_str)) else {
        warn!("Column {} has no observed values to impute from", column);
        return Ok(());
    };

    debug!("Imputing missing {} values with mode {}", column, fill);
    let filled = values
        .into_iter()
        .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
        .collect();
    set_text_column(df, column, filled)
}

fn impute_group_median(df: &mut DataFrame, column: &str, group: &str) -> Result<()> {
    let values = float_values(df, column)?;
    let groups = text_values(df, group)?;

    let mut observed: HashMap<&str, Vec<f64>> = HashMap::new();
    for (value, key) in values.iter().zip(&groups) {
        if let (Some(value), Some(key)) = (value, key) {
            observed.entry(key.as_str()).or_default().push(*value);
        }
    }
    let medians: HashMap<&str, f64> = observed
        .iter()
        .filter_map(|(k, v)| median(v).map(|m| (*k, m)))
        .collect();
    let all: Vec<f64> = values.iter().flatten().copied().collect();
    let global = median(&all);

    let filled: Vec<Option<f64>> = values
        .iter()
        .zip(&groups)
        .map(|(value, key)| {
            value.or_else(|| {
                key.as_deref()
                    .and_then(|k| medians.get(k).copied())
                    .or(global)
            })
        })
        .collect();

    set_float_column(df, column, filled)
}

/// Numeric columns as floats, the rest as text labels
pub fn conform_types(df: &mut DataFrame) -> Result<()> {
    for name in column_names(df) {
        if is_numeric(&name) {
            let values = float_values(df, &name)?;
            set_float_column(df, &name, values)?;
        } else if require_column(df, &name)?.dtype() != &DataType::String {
            let values = text_values(df, &name)?;
            set_text_column(df, &name, values)?;
        }
    }
    Ok(())
}

/// Persist the merged frame as CSV
pub fn write_frame_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    write_csv(df, path)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Read a merged frame written by [`write_frame_csv`]
pub fn read_frame_csv(path: &Path) -> Result<DataFrame> {
    let mut df = read_csv(CsvSource::new(path))?;
    conform_types(&mut df)?;
    info!("Loaded merged dataset with {} rows from {}", df.height(), path.display());
    Ok(df)
}
