//! CLI mode dispatch
//!
//! Loads the configuration, prepares the output directory and logging, then
//! runs the requested pipeline stage and prints its result.

use crate::cli::args::{Args, DataArgs, Mode};
use crate::cli::logging::init_logging;
use crate::cli::output_dir::{ensure_output_dir, resolve_output_dir};
use crate::cli::{Result, EXIT_SUCCESS};
use enem_insight_core::ml::trainer::ranked_coefficients;
use enem_insight_core::ml::ModelTrainingReport;
use enem_insight_core::pipeline::{AnalysisPipeline, ComparisonSummary, IDEB_PREPARED_FILE, MERGED_FILE};
use enem_insight_core::stats::{GroupComparison, NormalityRow, NormalityVerdict};
use enem_insight_core::PipelineConfig;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Exit code wrapper for CLI operations
pub type ExitCode = i32;

/// Run CLI mode and return exit code
pub async fn run_cli_mode(args: Args) -> ExitCode {
    match run(args).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.mode)?;

    let output_dir = resolve_output_dir(args.output_dir.clone(), config.output.directory.clone());
    ensure_output_dir(&output_dir)?;
    let _guard = init_logging(args.log_format, args.log_level(), &output_dir)?;
    info!("Writing results to {}", output_dir.display());

    let pipeline = AnalysisPipeline::new(config, output_dir);
    run_mode(&pipeline, args.mode, args.json_output).await
}

/// Configuration file (or defaults), then environment, then CLI flags
fn load_config(path: Option<&Path>, mode: &Mode) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env_overrides()?;

    match mode {
        Mode::Prepare(data) | Mode::Run(data) => apply_data_args(&mut config, data),
        Mode::FetchIdeb { ideb_archive } => {
            config.data.ideb_csv = None;
            if let Some(archive) = ideb_archive {
                config.data.ideb_archive = Some(archive.clone());
            }
        }
        _ => {}
    }

    config.validate()?;
    Ok(config)
}

fn apply_data_args(config: &mut PipelineConfig, data: &DataArgs) {
    if let Some(enem) = &data.enem {
        config.data.enem_path = Some(enem.clone());
    }
    if let Some(archive) = &data.ideb_archive {
        // a prepared table from the config file would shadow the archive
        config.data.ideb_archive = Some(archive.clone());
        config.data.ideb_csv = None;
    }
    if let Some(csv) = &data.ideb_csv {
        config.data.ideb_csv = Some(csv.clone());
    }
    if data.sample_rows.is_some() {
        config.data.sample_rows = data.sample_rows;
    }
}

/// Run specific CLI mode
async fn run_mode(pipeline: &AnalysisPipeline, mode: Mode, json_output: bool) -> Result<()> {
    match mode {
        Mode::FetchIdeb { .. } => {
            let ideb = pipeline.acquire_ideb().await?;
            let summary = FrameSummary {
                rows: ideb.height(),
                columns: ideb.width(),
                path: pipeline.output_path(IDEB_PREPARED_FILE).display().to_string(),
            };
            emit(json_output, &summary, |s| {
                println!("IDEB table: {} schools -> {}", s.rows, s.path)
            })
        }
        Mode::Prepare(_) => {
            let merged = pipeline.prepare().await?;
            let summary = FrameSummary {
                rows: merged.height(),
                columns: merged.width(),
                path: pipeline.output_path(MERGED_FILE).display().to_string(),
            };
            emit(json_output, &summary, |s| {
                println!("Merged dataset: {} rows, {} columns -> {}", s.rows, s.columns, s.path)
            })
        }
        Mode::Normality { merged } => {
            let frame = pipeline.load_merged(merged.as_deref())?;
            let rows = pipeline.normality(&frame)?;
            emit(json_output, &rows, |rows| print_normality(rows))
        }
        Mode::Compare { column, merged } => {
            let frame = pipeline.load_merged(merged.as_deref())?;
            let comparison = pipeline.compare(&frame, &column)?;
            emit(json_output, &comparison, print_comparison)
        }
        Mode::Train { merged } => {
            let frame = pipeline.load_merged(merged.as_deref())?;
            let report = pipeline.train(&frame)?;
            emit(json_output, &report, print_training)
        }
        Mode::Run(_) => {
            let report = pipeline.run().await?;
            emit(json_output, &report, |r| {
                println!("Merged dataset: {} rows, {} columns", r.rows, r.columns.len());
                println!();
                print_normality(&r.normality);
                println!();
                print_comparisons(&r.comparisons);
                println!();
                print_training(&r.training);
            })
        }
    }
}

#[derive(Debug, Serialize)]
struct FrameSummary {
    rows: usize,
    columns: usize,
    path: String,
}

/// Print `value` as JSON or through the text renderer
fn emit<T: Serialize>(json_output: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

fn verdict_line(name: &str, verdict: &NormalityVerdict) -> String {
    match &verdict.outcome {
        Some(o) => format!(
            "{}: statistic={:.4} p={:.4e} -> {}",
            name, o.statistic, o.p_value, verdict.verdict
        ),
        None => format!("{}: {}", name, verdict.verdict),
    }
}

fn print_normality(rows: &[NormalityRow]) {
    println!("Normality tests");
    for row in rows {
        println!("  {} (n={})", row.variable, row.observations);
        println!("    {}", verdict_line("Shapiro-Wilk", &row.shapiro_wilk));
        println!("    {}", verdict_line("D'Agostino K2", &row.dagostino_k2));
    }
}

fn print_comparison(c: &GroupComparison) {
    println!(
        "{} by {} ({} levels): {:?} statistic={:.4} p={:.4e} -> {}",
        c.target, c.column, c.levels, c.test, c.outcome.statistic, c.outcome.p_value, c.verdict
    );
}

fn print_comparisons(summary: &ComparisonSummary) {
    println!("Group comparisons (alpha={})", summary.alpha);
    for comparison in &summary.comparisons {
        print!("  ");
        print_comparison(comparison);
    }
    for skipped in &summary.skipped {
        println!("  {}: skipped ({})", skipped.column, skipped.reason);
    }
}

fn print_training(report: &ModelTrainingReport) {
    let linear = &report.linear_regression.test_metrics;
    let tree = &report.decision_tree.test_metrics;
    let show = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string());

    println!(
        "Models of {} ({} samples, {} features, seed {})",
        report.target,
        report.samples,
        report.features.len(),
        report.seed
    );
    println!(
        "  Linear regression: MSE={} MAE={} R2={}",
        show(linear.mse),
        show(linear.mae),
        show(linear.r2_score)
    );
    for (feature, coefficient) in ranked_coefficients(&report.linear_regression).iter().take(5) {
        println!("    {:<28} {:>10.4}", feature, coefficient);
    }
    println!(
        "  Decision tree (above {}): accuracy={} precision={} recall={} F1={}",
        show(report.decision_tree.threshold),
        show(tree.accuracy),
        show(tree.precision),
        show(tree.recall),
        show(tree.f1_score)
    );
}
