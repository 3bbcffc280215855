//! CLI argument parsing
//!
//! Global options apply to every subcommand:
//! - `--config <file>`, `--output-dir <dir>`, `--json`
//! - `--log-format text|json`, `-v/--verbose` (repeatable), `--quiet`

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parsed CLI arguments
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "enem-insight", version)]
#[command(about = "Statistical analysis of ENEM scores against socioeconomic profile and school IDEB")]
pub struct Args {
    /// Configuration file (.toml, .json, .yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory (default: $ENEM_INSIGHT_HOME/output, then ./output)
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    pub json_output: bool,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// More verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Input overrides shared by the data preparation modes
#[derive(Debug, Clone, Default, PartialEq, ClapArgs)]
pub struct DataArgs {
    /// ENEM microdata CSV
    #[arg(long, value_name = "CSV")]
    pub enem: Option<PathBuf>,

    /// Prepared IDEB table, skips download and preparation
    #[arg(long, value_name = "CSV")]
    pub ideb_csv: Option<PathBuf>,

    /// Local IDEB archive used instead of downloading
    #[arg(long, value_name = "ZIP")]
    pub ideb_archive: Option<PathBuf>,

    /// Read at most N ENEM rows
    #[arg(long, value_name = "N")]
    pub sample_rows: Option<usize>,
}

/// CLI modes
#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Mode {
    /// Download and prepare the IDEB table
    FetchIdeb {
        /// Local IDEB archive used instead of downloading
        #[arg(long, value_name = "ZIP")]
        ideb_archive: Option<PathBuf>,
    },

    /// Build the merged ENEM x IDEB dataset
    Prepare(DataArgs),

    /// Normality tests of the numeric variables
    Normality {
        /// Merged dataset (default: <output>/merged.csv)
        #[arg(long, value_name = "CSV")]
        merged: Option<PathBuf>,
    },

    /// Compare the score across the levels of one column
    Compare {
        /// Categorical column to split the score by
        #[arg(long)]
        column: String,

        /// Merged dataset (default: <output>/merged.csv)
        #[arg(long, value_name = "CSV")]
        merged: Option<PathBuf>,
    },

    /// Train and evaluate the models
    Train {
        /// Merged dataset (default: <output>/merged.csv)
        #[arg(long, value_name = "CSV")]
        merged: Option<PathBuf>,
    },

    /// Run every stage
    Run(DataArgs),
}

impl Args {
    /// Console log level from the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
