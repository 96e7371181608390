//! Results table in CSV form
//!
//! Columns: `Prompt Number`, `Prompt Text`, `Papers Tested`, `Repeats`,
//! `Model`, then `<Label> Mean` / `<Label> Std` per metric.

use indexmap::IndexMap;
use std::path::Path;

use super::{MeanStd, ReportError, ResultRow};
use crate::metrics::MetricId;
use crate::runner::AggregateResult;

const FIXED_COLUMNS: [&str; 5] = ["Prompt Number", "Prompt Text", "Papers Tested", "Repeats", "Model"];

/// Write the aggregated table, replacing any existing file
pub fn write_results_csv(path: impl AsRef<Path>, result: &AggregateResult) -> Result<(), ReportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for metric in &result.metrics {
        header.push(format!("{} Mean", metric.label()));
        header.push(format!("{} Std", metric.label()));
    }
    writer.write_record(&header)?;

    for row in ResultRow::from_aggregate(result) {
        let mut record = vec![
            row.prompt_number.to_string(),
            row.prompt_text.clone(),
            row.papers_tested.to_string(),
            row.repeats.to_string(),
            row.model.clone(),
        ];
        for metric in &result.metrics {
            // Display for f64 is the shortest text that parses back to the same value
            match row.scores.get(metric) {
                Some(score) => {
                    record.push(score.mean.to_string());
                    record.push(score.std.to_string());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    tracing::info!("Results written to {}", path.display());
    Ok(())
}

/// Parse a results file written by [`write_results_csv`]
pub fn read_results_csv(path: impl AsRef<Path>) -> Result<Vec<ResultRow>, ReportError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();

    for (i, expected) in FIXED_COLUMNS.iter().enumerate() {
        if headers.get(i) != Some(*expected) {
            return Err(ReportError::Format(format!(
                "column {} should be '{}', found '{}'",
                i + 1,
                expected,
                headers.get(i).unwrap_or("")
            )));
        }
    }

    let mut metric_columns: Vec<(MetricId, usize, usize)> = Vec::new();
    let mut col = FIXED_COLUMNS.len();
    while col < headers.len() {
        let mean_header = headers.get(col).unwrap_or("");
        let label = mean_header
            .strip_suffix(" Mean")
            .ok_or_else(|| ReportError::Format(format!("unexpected column '{}'", mean_header)))?;
        let metric = MetricId::from_label(label)
            .ok_or_else(|| ReportError::Format(format!("unknown metric '{}'", label)))?;
        let std_header = format!("{} Std", label);
        if headers.get(col + 1) != Some(std_header.as_str()) {
            return Err(ReportError::Format(format!("missing column '{}'", std_header)));
        }
        metric_columns.push((metric, col, col + 1));
        col += 2;
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let float = |i: usize| -> Result<f64, ReportError> {
            field(i)
                .parse()
                .map_err(|e| ReportError::Format(format!("row {}: column {}: {}", line + 1, i + 1, e)))
        };

        let mut scores = IndexMap::new();
        for &(metric, mean_col, std_col) in &metric_columns {
            if field(mean_col).is_empty() {
                continue;
            }
            scores.insert(
                metric,
                MeanStd {
                    mean: float(mean_col)?,
                    std: float(std_col)?,
                },
            );
        }

        rows.push(ResultRow {
            prompt_number: parse_column(field(0), line, 0)?,
            prompt_text: field(1).to_string(),
            papers_tested: parse_column(field(2), line, 2)?,
            repeats: parse_column(field(3), line, 3)?,
            model: field(4).to_string(),
            scores,
        });
    }

    Ok(rows)
}

fn parse_column<T>(text: &str, line: usize, column: usize) -> Result<T, ReportError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse()
        .map_err(|e| ReportError::Format(format!("row {}: {}: {}", line + 1, FIXED_COLUMNS[column], e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailurePolicy;
    use crate::runner::{AggregateRow, MetricSummary};

    fn aggregate() -> AggregateResult {
        let summary = |mean: f64, std: f64| MetricSummary {
            mean,
            std,
            valid: 3,
            recorded: 3,
        };
        AggregateResult {
            metrics: vec![MetricId::Rouge1, MetricId::Fkgl],
            failure_policy: FailurePolicy::Drop,
            rows: vec![
                AggregateRow {
                    prompt_number: 1,
                    prompt_id: "pls-detailed".into(),
                    prompt_label: "Compose a detailed, \"plain\" summary.\nSecond line".into(),
                    model: "OpenAI GPT".into(),
                    papers_tested: 10,
                    repeats: 3,
                    metrics: [
                        (MetricId::Rouge1, summary(0.1 + 0.2, 1.0 / 3.0)),
                        (MetricId::Fkgl, summary(12.345678901234567, 0.0)),
                    ]
                    .into_iter()
                    .collect(),
                },
                AggregateRow {
                    prompt_number: 2,
                    prompt_id: "few-shot".into(),
                    prompt_label: "Few shot".into(),
                    model: "Google Gemini".into(),
                    papers_tested: 9,
                    repeats: 3,
                    metrics: [
                        (MetricId::Rouge1, summary(0.4, 0.05)),
                        (MetricId::Fkgl, summary(-1.5, 2.25)),
                    ]
                    .into_iter()
                    .collect(),
                },
            ],
        }
    }

    #[test]
    fn test_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_results_csv(&path, &aggregate()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "Prompt Number,Prompt Text,Papers Tested,Repeats,Model,ROUGE-1 Mean,ROUGE-1 Std,FKGL Mean,FKGL Std"
        );
    }

    #[test]
    fn test_roundtrip_reproduces_scores_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");
        let result = aggregate();
        write_results_csv(&path, &result).unwrap();

        let rows = read_results_csv(&path).unwrap();
        assert_eq!(rows, ResultRow::from_aggregate(&result));
        assert_eq!(rows[0].scores[&MetricId::Rouge1].mean, 0.1 + 0.2);
        assert_eq!(rows[0].prompt_text, "Compose a detailed, \"plain\" summary.\nSecond line");
    }

    #[test]
    fn test_rejects_foreign_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        assert!(matches!(read_results_csv(&path), Err(ReportError::Format(_))));
    }

    #[test]
    fn test_repeats_out_of_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(
            &path,
            "Prompt Number,Prompt Text,Papers Tested,Repeats,Model,ROUGE-1 Mean,ROUGE-1 Std\n\
             1,Plain,10,4294967299,GPT,0.5,0.1\n",
        )
        .unwrap();

        match read_results_csv(&path) {
            Err(ReportError::Format(message)) => assert!(message.contains("Repeats"), "{}", message),
            other => panic!("expected a format error, got {:?}", other),
        }
    }
}
