//! CLI module
//!
//! Provides:
//! - Argument parsing for the analysis modes
//! - Output directory resolution (flag -> env -> config -> ./output)
//! - Logging setup
//! - Mode dispatch and exit codes

pub mod args;
pub mod dispatch;
pub mod logging;
pub mod output_dir;

use enem_insight_core::AnalysisError;

// Re-exports
pub use args::{Args, DataArgs, LogFormat, Mode};
pub use dispatch::{run_cli_mode, ExitCode};
pub use output_dir::{ensure_output_dir, resolve_output_dir};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgs(_) => EXIT_INPUT_ERROR,
            Error::Analysis(e) if e.is_input_error() => EXIT_INPUT_ERROR,
            _ => EXIT_FAILURE,
        }
    }
}

/// Exit codes (deterministic)
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INPUT_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
