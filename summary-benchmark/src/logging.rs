//! Log output: human-readable stderr plus a daily-rolling log file

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;

/// Log files are named `summary-benchmark.<date>.log`
pub const LOG_FILE_PREFIX: &str = "summary-benchmark";

pub fn filter_directives(verbose: bool) -> &'static str {
    if verbose {
        "summary_benchmark=debug,info"
    } else {
        "summary_benchmark=info,warn"
    }
}

/// Daily appender in `log_dir`, creating the directory first
pub fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, ConfigError> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        ConfigError::Invalid(format!("cannot create log directory {}: {}", log_dir.display(), e))
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| ConfigError::Invalid(format!("cannot open log file in {}: {}", log_dir.display(), e)))
}

/// Install the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard, ConfigError> {
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter_directives(verbose)));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new(filter_directives(verbose)));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
