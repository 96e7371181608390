//! Benchmark execution engine

pub mod accumulator;
pub mod executor;
pub mod pacing;

pub use accumulator::{
    summarize, Accumulator, AggregateResult, AggregateRow, Aggregation, MetricSummary,
};
pub use executor::{
    truncate_words, ConsoleProgress, Executor, GeneratedSummary, NoOpProgress, ProgressCallback,
    RunOutput,
};
pub use pacing::{Pacer, RetryPolicy};

use crate::config::ConfigError;
use crate::dataset::LoadError;
use crate::reporting::ReportError;

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Dataset error: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}
