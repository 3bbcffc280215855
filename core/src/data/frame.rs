//! Data frame helpers shared by the loaders and the analyses
//!
//! Columns are pulled out of polars as plain vectors so that the
//! imputation and test code stays independent of the frame library.

use crate::error::{AnalysisError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Get a column or fail with [`AnalysisError::MissingColumn`]
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map_err(|_| AnalysisError::MissingColumn(name.to_string()))
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Column values as floats; unparseable text becomes `None`
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = require_column(df, name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

/// Non-missing float values of a column
pub fn present_floats(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(float_values(df, name)?.into_iter().flatten().collect())
}

/// Column values as category labels
///
/// Integral floats are rendered without a fractional part, so a code read
/// as `2.0` and one read as `2` land in the same category. Blank strings
/// are treated as missing.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = require_column(df, name)?;
    match series.dtype() {
        DataType::Float32 | DataType::Float64 => {
            let series = series.cast(&DataType::Float64)?;
            let values = series
                .f64()?
                .into_iter()
                .map(|v| v.filter(|f| f.is_finite()).map(format_code))
                .collect();
            Ok(values)
        }
        _ => {
            let series = series.cast(&DataType::String)?;
            let values = series
                .str()?
                .into_iter()
                .map(|v| v.and_then(normalize_label))
                .collect();
            Ok(values)
        }
    }
}

/// Render a numeric code as a label
pub fn format_code(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn normalize_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.strip_suffix(".0") {
        Some(head) if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) => {
            Some(head.to_string())
        }
        _ => Some(trimmed.to_string()),
    }
}

/// Replace (or add) a float column
pub fn set_float_column(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Series::new(name, values))?;
    Ok(())
}

/// Replace (or add) a text column
pub fn set_text_column(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Series::new(name, values))?;
    Ok(())
}

/// Keep the rows whose flag is set
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep", keep);
    Ok(df.filter(&mask)?)
}

/// Drop a column if it is present
pub fn drop_if_present(df: DataFrame, name: &str) -> Result<DataFrame> {
    if has_column(&df, name) {
        Ok(df.drop(name)?)
    } else {
        Ok(df)
    }
}

/// Column names from the header line of a delimited file
pub fn csv_header(path: &Path, separator: u8) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(AnalysisError::NotFound(path.to_path_buf()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut raw = Vec::new();
    reader.read_until(b'\n', &mut raw)?;
    let line = String::from_utf8_lossy(&raw);

    Ok(line
        .trim_end_matches(['\r', '\n'])
        .split(separator as char)
        .map(|c| c.trim().trim_matches('"').to_string())
        .collect())
}

/// Options for [`read_csv`]
#[derive(Debug, Clone)]
pub struct CsvSource<'a> {
    pub path: &'a Path,
    pub separator: u8,
    pub columns: Option<Vec<String>>,
    pub max_rows: Option<usize>,
}

impl<'a> CsvSource<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self {
            path,
            separator: b',',
            columns: None,
            max_rows: None,
        }
    }
}

/// Read a delimited file with polars, decoding invalid UTF-8 lossily
pub fn read_csv(source: CsvSource<'_>) -> Result<DataFrame> {
    if !source.path.exists() {
        return Err(AnalysisError::NotFound(source.path.to_path_buf()));
    }

    let separator = source.separator;
    let mut options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .with_n_rows(source.max_rows)
        .map_parse_options(|opts| {
            opts.with_separator(separator)
                .with_encoding(CsvEncoding::LossyUtf8)
        });

    if let Some(columns) = source.columns {
        let columns: Arc<[String]> = Arc::from(columns);
        options = options.with_columns(Some(columns));
    }

    let df = options
        .try_into_reader_with_file_path(Some(source.path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Write a frame as a comma separated file with header
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
