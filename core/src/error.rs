//! Error type shared by every stage of the analysis pipeline

use std::path::PathBuf;

/// Analysis errors
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Data frame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate sample: {0}")]
    DegenerateSample(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl AnalysisError {
    /// True when the failure comes from user input (paths, config, columns)
    /// rather than from the analysis itself.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::Config(_) | AnalysisError::MissingColumn(_) | AnalysisError::NotFound(_)
        )
    }
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
