//! Configuration Management Module
//!
//! Pipeline configuration loaded from TOML, JSON or YAML files, with
//! environment variable overrides and validation.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Published IDEB 2017 high-school results, per school
pub const DEFAULT_IDEB_URL: &str = "http://download.inep.gov.br/educacao_basica/portal_ideb/planilhas_para_download/2017/divulgacao_ensino_medio-escolas-2017.zip";

/// Spreadsheet entry inside the IDEB archive
pub const DEFAULT_IDEB_ENTRY: &str = "divulgacao_ensino_medio-escolas-2017.xlsx";

/// Configuration file format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    Json,
    #[default]
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(AnalysisError::Config(format!(
                "Unsupported config format: '{}'",
                s
            ))),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub stats: StatsConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
}

/// Where the raw data comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// URL of the zipped IDEB spreadsheet
    pub ideb_url: String,
    /// Spreadsheet entry name inside the archive
    pub ideb_entry: String,
    /// Local copy of the IDEB archive, used instead of downloading
    pub ideb_archive: Option<PathBuf>,
    /// Already prepared IDEB table (CSV), skips download and preparation
    pub ideb_csv: Option<PathBuf>,
    /// ENEM microdata CSV
    pub enem_path: Option<PathBuf>,
    /// Read at most this many ENEM rows
    pub sample_rows: Option<usize>,
    /// Download cache directory (default: `<output>/cache`)
    pub cache_dir: Option<PathBuf>,
    /// Socioeconomic columns carried from ENEM, besides the mandatory ones
    pub categorical_columns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ideb_url: DEFAULT_IDEB_URL.to_string(),
            ideb_entry: DEFAULT_IDEB_ENTRY.to_string(),
            ideb_archive: None,
            ideb_csv: None,
            enem_path: None,
            sample_rows: None,
            cache_dir: None,
            categorical_columns: ["TP_SEXO", "TP_COR_RACA", "TP_ESCOLA", "Q001", "Q002", "Q006", "Q025"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Hypothesis testing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    /// Significance level
    pub alpha: f64,
    /// Column compared across groups
    pub target_column: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            target_column: crate::data::columns::TOTAL_SCORE.to_string(),
        }
    }
}

/// Model training settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub tree_max_depth: usize,
    pub tree_min_weight_split: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            tree_max_depth: 8,
            tree_min_weight_split: 2.0,
        }
    }
}

/// Report settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory; resolved by the CLI when absent
    pub directory: Option<PathBuf>,
    /// Pretty-print JSON reports
    pub pretty_json: bool,
}

impl PipelineConfig {
    /// Load configuration from a file, format chosen by extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AnalysisError::NotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path)?;

        let config: PipelineConfig = match format {
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| AnalysisError::Config(format!("Failed to parse TOML config: {}", e)))?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| AnalysisError::Config(format!("Failed to parse JSON config: {}", e)))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| AnalysisError::Config(format!("Failed to parse YAML config: {}", e)))?,
        };

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a file, format chosen by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = ConfigFormat::from_path(path)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| {
                AnalysisError::Config(format!("Failed to serialize TOML config: {}", e))
            })?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| {
                AnalysisError::Config(format!("Failed to serialize YAML config: {}", e))
            })?,
        };

        fs::write(path, content)?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Apply `ENEM_INSIGHT_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ENEM_INSIGHT_ENEM_PATH") {
            self.data.enem_path = Some(PathBuf::from(path));
            debug!("Applied env override for ENEM path");
        }

        if let Some(url) = lookup("ENEM_INSIGHT_IDEB_URL") {
            self.data.ideb_url = url;
            debug!("Applied env override for IDEB url");
        }

        if let Some(alpha) = lookup("ENEM_INSIGHT_ALPHA") {
            self.stats.alpha = parse_override("ENEM_INSIGHT_ALPHA", &alpha)?;
            debug!("Applied env override for alpha");
        }

        if let Some(seed) = lookup("ENEM_INSIGHT_SEED") {
            self.model.seed = parse_override("ENEM_INSIGHT_SEED", &seed)?;
            debug!("Applied env override for seed");
        }

        if let Some(rows) = lookup("ENEM_INSIGHT_SAMPLE_ROWS") {
            self.data.sample_rows = Some(parse_override("ENEM_INSIGHT_SAMPLE_ROWS", &rows)?);
            debug!("Applied env override for sample rows");
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.stats.alpha > 0.0 && self.stats.alpha < 1.0) {
            return Err(AnalysisError::Config(format!(
                "alpha must be in (0, 1), got {}",
                self.stats.alpha
            )));
        }

        if !(self.model.test_fraction > 0.0 && self.model.test_fraction < 1.0) {
            return Err(AnalysisError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.model.test_fraction
            )));
        }

        if self.model.tree_max_depth == 0 {
            return Err(AnalysisError::Config(
                "tree_max_depth must be at least 1".to_string(),
            ));
        }

        if self.data.ideb_url.trim().is_empty() {
            return Err(AnalysisError::Config("ideb_url cannot be empty".to_string()));
        }

        if self.data.sample_rows == Some(0) {
            return Err(AnalysisError::Config(
                "sample_rows must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AnalysisError::Config(format!("Invalid value for {}: '{}'", key, value)))
}
