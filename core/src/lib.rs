//! ENEM Insight Core
//!
//! Data acquisition, preparation, hypothesis testing and model training for
//! the study of ENEM exam scores against the socioeconomic profile of the
//! candidates and the IDEB index of their schools.

pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod pipeline;
pub mod stats;

pub use config::PipelineConfig;
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisPipeline, AnalysisReport, ComparisonSummary};
