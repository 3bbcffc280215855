//! Output directory resolution
//!
//! Resolution priority:
//! 1. --output-dir <path> flag (highest priority)
//! 2. $ENEM_INSIGHT_HOME env var -> $ENEM_INSIGHT_HOME/output
//! 3. `output.directory` from the configuration file
//! 4. ./output (default)

use crate::cli::{Error, Result};
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "ENEM_INSIGHT_HOME";

/// Resolve the output directory from the process environment
pub fn resolve_output_dir(explicit: Option<PathBuf>, configured: Option<PathBuf>) -> PathBuf {
    resolve_output_dir_with(explicit, configured, |key| std::env::var(key).ok())
}

/// Resolve the output directory, reading variables through `lookup`
pub fn resolve_output_dir_with<F>(
    explicit: Option<PathBuf>,
    configured: Option<PathBuf>,
    lookup: F,
) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return path;
    }

    if let Some(home) = lookup(HOME_ENV).filter(|h| !h.trim().is_empty()) {
        return PathBuf::from(home).join("output");
    }

    configured.unwrap_or_else(|| PathBuf::from("output"))
}

/// Create the output directory if missing; it must end up a directory
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(Error::InvalidArgs(format!(
            "output path '{}' is not a directory",
            path.display()
        )));
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}
