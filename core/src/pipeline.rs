//! Analysis pipeline orchestration
//!
//! Acquire IDEB, load and prepare ENEM, merge, test hypotheses and train
//! the models. Every stage can run on its own; each writes its result to
//! the output directory.

use crate::config::PipelineConfig;
use crate::data::columns::is_numeric;
use crate::data::frame::{column_names, has_column, write_csv};
use crate::data::{
    fetch_ideb_archive, load_enem, load_prepared_ideb, merge_datasets, prepare_enem,
    prepare_ideb, read_frame_csv, read_ideb_sheet, write_frame_csv,
};
use crate::error::{AnalysisError, Result};
use crate::ml::{train_models, ModelTrainingReport};
use crate::stats::{compare_groups, normality_report, GroupComparison, NormalityRow};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

pub const MERGED_FILE: &str = "merged.csv";
pub const IDEB_PREPARED_FILE: &str = "ideb_prepared.csv";
pub const NORMALITY_FILE: &str = "normality.json";
pub const COMPARISONS_FILE: &str = "comparisons.json";
pub const TRAINING_FILE: &str = "training.json";
pub const REPORT_FILE: &str = "report.json";

/// A comparison that could not be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedComparison {
    pub column: String,
    pub reason: String,
}

/// Group comparisons of the target over every configured column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub target: String,
    pub alpha: f64,
    pub comparisons: Vec<GroupComparison>,
    pub skipped: Vec<SkippedComparison>,
}

/// Everything a full run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows: usize,
    pub columns: Vec<String>,
    pub normality: Vec<NormalityRow>,
    pub comparisons: ComparisonSummary,
    pub training: ModelTrainingReport,
}

/// Drives the analysis stages with one configuration and output directory
pub struct AnalysisPipeline {
    config: PipelineConfig,
    output_dir: PathBuf,
}

impl AnalysisPipeline {
    pub fn new(config: PipelineConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    fn cache_dir(&self) -> PathBuf {
        self.config
            .data
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("cache"))
    }

    /// Download (or read locally) the IDEB archive without preparing it
    pub async fn fetch_ideb(&self) -> Result<Vec<u8>> {
        match &self.config.data.ideb_archive {
            Some(path) => {
                if !path.exists() {
                    return Err(AnalysisError::NotFound(path.clone()));
                }
                info!("Reading local IDEB archive {}", path.display());
                Ok(tokio::fs::read(path).await?)
            }
            None => fetch_ideb_archive(&self.config.data.ideb_url, &self.cache_dir()).await,
        }
    }

    /// Prepared IDEB table: a prepared CSV when configured, otherwise the
    /// archive is read and prepared, and the result saved
    pub async fn acquire_ideb(&self) -> Result<DataFrame> {
        if let Some(path) = &self.config.data.ideb_csv {
            return load_prepared_ideb(path);
        }

        let archive = self.fetch_ideb().await?;
        let sheet = read_ideb_sheet(&archive, &self.config.data.ideb_entry)?;
        let mut ideb = prepare_ideb(&sheet)?;
        write_csv(&mut ideb, &self.output_path(IDEB_PREPARED_FILE))?;
        Ok(ideb)
    }

    /// Load and prepare the ENEM microdata
    pub fn load_enem(&self) -> Result<DataFrame> {
        let path = self.config.data.enem_path.as_ref().ok_or_else(|| {
            AnalysisError::Config("no ENEM microdata file configured".to_string())
        })?;
        let raw = load_enem(
            path,
            &self.config.data.categorical_columns,
            self.config.data.sample_rows,
        )?;
        prepare_enem(&raw)
    }

    /// Build the merged dataset and save it as `merged.csv`
    pub async fn prepare(&self) -> Result<DataFrame> {
        let enem = self.load_enem()?;
        let ideb = self.acquire_ideb().await?;
        let mut merged = merge_datasets(&enem, &ideb)?;
        write_frame_csv(&mut merged, &self.output_path(MERGED_FILE))?;
        Ok(merged)
    }

    /// Read a merged dataset, by default the one from the output directory
    pub fn load_merged(&self, path: Option<&Path>) -> Result<DataFrame> {
        match path {
            Some(path) => read_frame_csv(path),
            None => read_frame_csv(&self.output_path(MERGED_FILE)),
        }
    }

    /// Normality tests of every numeric column, saved as `normality.json`
    pub fn normality(&self, frame: &DataFrame) -> Result<Vec<NormalityRow>> {
        let rows = normality_report(frame, self.config.stats.alpha)?;
        self.write_json(NORMALITY_FILE, &rows)?;
        Ok(rows)
    }

    /// Compare the target across the levels of one column
    pub fn compare(&self, frame: &DataFrame, column: &str) -> Result<GroupComparison> {
        compare_groups(
            frame,
            column,
            &self.config.stats.target_column,
            self.config.stats.alpha,
        )
    }

    /// Compare the target across every configured categorical column,
    /// saved as `comparisons.json`
    ///
    /// Absent columns and columns with a single level are reported as
    /// skipped.
    pub fn compare_all(&self, frame: &DataFrame) -> Result<ComparisonSummary> {
        let mut comparisons = Vec::new();
        let mut skipped = Vec::new();

        for column in &self.config.data.categorical_columns {
            if !has_column(frame, column) {
                skipped.push(SkippedComparison {
                    column: column.clone(),
                    reason: "column not present in the dataset".to_string(),
                });
                continue;
            }

            match self.compare(frame, column) {
                Ok(comparison) => comparisons.push(comparison),
                Err(e @ (AnalysisError::InsufficientData(_) | AnalysisError::DegenerateSample(_))) => {
                    warn!("Skipping comparison over {}: {}", column, e);
                    skipped.push(SkippedComparison {
                        column: column.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let summary = ComparisonSummary {
            target: self.config.stats.target_column.clone(),
            alpha: self.config.stats.alpha,
            comparisons,
            skipped,
        };
        self.write_json(COMPARISONS_FILE, &summary)?;
        Ok(summary)
    }

    /// Train the models on every other column, saved as `training.json`
    pub fn train(&self, frame: &DataFrame) -> Result<ModelTrainingReport> {
        let target = &self.config.stats.target_column;
        let categorical: Vec<String> = column_names(frame)
            .into_iter()
            .filter(|c| c != target && !is_numeric(c))
            .collect();

        let report = train_models(frame, target, &categorical, &self.config.model)?;
        self.write_json(TRAINING_FILE, &report)?;
        Ok(report)
    }

    /// Run every stage and save `report.json`
    pub async fn run(&self) -> Result<AnalysisReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting analysis run");

        let merged = self.prepare().await?;
        let normality = self.normality(&merged)?;
        let comparisons = self.compare_all(&merged)?;
        let training = self.train(&merged)?;

        let report = AnalysisReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            rows: merged.height(),
            columns: column_names(&merged),
            normality,
            comparisons,
            training,
        };
        let path = self.write_json(REPORT_FILE, &report)?;
        info!(run_id = %run_id, "Analysis report written to {}", path.display());
        Ok(report)
    }

    /// Serialize `value` into the output directory
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(name);
        let content = if self.config.output.pretty_json {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
