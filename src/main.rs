//! enem-insight CLI
//!
//! Modes: fetch-ideb, prepare, normality, compare, train, run.
//! Exit codes: 0 success, 1 analysis failure, 2 input or configuration error.

use anyhow::Context;
use clap::Parser;
use enem_insight::cli::{run_cli_mode, Args};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let exit_code = runtime.block_on(run_cli_mode(args));
    drop(runtime);
    std::process::exit(exit_code);
}
