//! Tracing setup
//!
//! Console output goes to stderr, as compact text or JSON. A daily rolling
//! JSON log is also written under `<output>/logs`.

use crate::cli::args::LogFormat;
use crate::cli::{Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "enem-insight";

/// `RUST_LOG` when set, otherwise `level`
fn console_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber
///
/// The returned guard flushes the file log on drop and must live until
/// the program exits.
pub fn init_logging(format: LogFormat, level: &str, output_dir: &Path) -> Result<WorkerGuard> {
    let log_dir = output_dir.join(LOG_DIR);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("json")
        .build(&log_dir)
        .map_err(|e| Error::Logging(e.to_string()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let text_layer = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(console_filter(level))
    });

    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter(level))
    });

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_current_span(true)
        .with_filter(EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(guard)
}
