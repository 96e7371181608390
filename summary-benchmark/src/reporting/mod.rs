//! Results reporting

pub mod csv_writer;
pub mod transcript;

pub use csv_writer::{read_results_csv, write_results_csv};
pub use transcript::{read_transcript, TranscriptEntry, TranscriptWriter};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::metrics::MetricId;
use crate::runner::AggregateResult;

/// Errors writing or reading result files
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed results file: {0}")]
    Format(String),
}

/// Mean and standard deviation as stored in the results table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
}

/// One row of the results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub prompt_number: usize,
    pub prompt_text: String,
    pub papers_tested: usize,
    pub repeats: u32,
    pub model: String,
    pub scores: IndexMap<MetricId, MeanStd>,
}

impl ResultRow {
    /// Table rows of an aggregated run
    pub fn from_aggregate(result: &AggregateResult) -> Vec<ResultRow> {
        result
            .rows
            .iter()
            .map(|row| ResultRow {
                prompt_number: row.prompt_number,
                prompt_text: row.prompt_label.clone(),
                papers_tested: row.papers_tested,
                repeats: row.repeats,
                model: row.model.clone(),
                scores: result
                    .metrics
                    .iter()
                    .filter_map(|m| {
                        row.metrics.get(m).map(|s| {
                            (
                                *m,
                                MeanStd {
                                    mean: s.mean,
                                    std: s.std,
                                },
                            )
                        })
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Shorten long prompt texts for the console
fn short_label(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Generate a console report
pub fn print_console_report(rows: &[ResultRow]) {
    println!("\n=== Summary Benchmark Results ===\n");

    let mut current_prompt = None;
    for row in rows {
        if current_prompt != Some(row.prompt_number) {
            current_prompt = Some(row.prompt_number);
            println!("Prompt {}: {}", row.prompt_number, short_label(&row.prompt_text, 70));
            println!("{:-<50}", "");
        }

        println!(
            "  {} - Papers: {}, Repeats: {}",
            row.model, row.papers_tested, row.repeats
        );
        for (metric, score) in &row.scores {
            println!("    {:<11} {:>8.4} ± {:.4}", metric.label(), score.mean, score.std);
        }
    }

    println!("\n{:=<50}", "");
}

/// Printed instead of a table when a run produced no valid score
pub fn print_no_scores() {
    println!("No scores calculated.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailurePolicy;
    use crate::runner::{AggregateRow, MetricSummary};

    #[test]
    fn test_rows_follow_metric_order() {
        let summary = |mean| MetricSummary {
            mean,
            std: 0.0,
            valid: 1,
            recorded: 1,
        };
        let result = AggregateResult {
            metrics: vec![MetricId::Fkgl, MetricId::Rouge1],
            failure_policy: FailurePolicy::Drop,
            rows: vec![AggregateRow {
                prompt_number: 1,
                prompt_id: "p".into(),
                prompt_label: "Label".into(),
                model: "GPT".into(),
                papers_tested: 2,
                repeats: 3,
                metrics: [(MetricId::Rouge1, summary(0.4)), (MetricId::Fkgl, summary(9.0))]
                    .into_iter()
                    .collect(),
            }],
        };

        let rows = ResultRow::from_aggregate(&result);
        assert_eq!(rows.len(), 1);
        let keys: Vec<_> = rows[0].scores.keys().copied().collect();
        assert_eq!(keys, vec![MetricId::Fkgl, MetricId::Rouge1]);
        assert_eq!(rows[0].prompt_text, "Label");
    }

    #[test]
    fn test_short_label() {
        assert_eq!(short_label("abc\nsecond line", 10), "abc");
        assert_eq!(short_label("abcdefghijkl", 8), "abcde...");
    }
}
