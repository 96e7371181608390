//! Benchmark Suite for LLM-generated Plain-Language Summaries
//!
//! This crate asks LLM APIs to write plain-language summaries of biomedical
//! research abstracts, scores each summary against a reference summary and
//! the source abstract, and reduces the scores to a per (prompt, model)
//! mean / standard deviation table.
//!
//! # Features
//!
//! - JSON and JSON Lines datasets with configurable field names
//! - Built-in prompt families plus inline templates
//! - OpenAI-compatible and Google Gemini generators
//! - Native ROUGE-1/2/L, Flesch-Kincaid, Coleman-Liau and Dale-Chall scores
//! - BERTScore, AlignScore and SummaC through an external scoring service
//! - Optional LexRank or model-based key-sentence extraction
//! - CSV results table and JSONL generation transcript
//!
//! # Example
//!
//! ```no_run
//! use summary_benchmark::{
//!     config::Config,
//!     dataset::load_documents,
//!     metrics::MetricSuite,
//!     prompts::PromptSet,
//!     providers::create_models,
//!     runner::{Aggregation, Executor},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     config.validate()?;
//!
//!     let documents = load_documents(&config.experiment.dataset, &config.dataset)?;
//!     let models = create_models(&config)?;
//!     let prompts = PromptSet::from_config(&config.prompts)?;
//!     let suite = MetricSuite::from_config(&config)?;
//!
//!     let executor = Executor::from_config(&config, models, prompts, suite);
//!     let output = executor.run(&documents).await;
//!
//!     if let Aggregation::Table(table) = output.accumulator.aggregate(config.experiment.failure_policy) {
//!         println!("{} rows", table.rows.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod logging;
pub mod metrics;
pub mod prompts;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::{Config, FailurePolicy};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{Config, ConfigError, FailurePolicy};
    pub use crate::dataset::{load_documents, Document, LoadError};
    pub use crate::metrics::{MetricId, MetricRecord, MetricSuite, Scorer, ScoringError};
    pub use crate::prompts::{Prompt, PromptSet, PromptTemplate};
    pub use crate::providers::{
        create_models, CompletionRequest, CompletionResponse, GenerationError, Generator, Message,
        Model,
    };
    pub use crate::reporting::{print_console_report, read_results_csv, write_results_csv, ResultRow};
    pub use crate::runner::{Accumulator, Aggregation, AggregateResult, Executor, RunError};
}
