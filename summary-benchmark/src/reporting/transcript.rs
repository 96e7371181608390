//! Append-only JSON Lines record of every generation

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::ReportError;
use crate::metrics::{MetricId, MetricRecord};
use crate::prompts::Prompt;
use crate::providers::GenerationError;
use crate::runner::GeneratedSummary;

/// One generation with its scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: String,
    pub document_index: usize,
    pub prompt_number: usize,
    pub prompt_id: String,
    /// Prompt with the abstract hidden
    pub prompt: String,
    pub model: String,
    pub repeat: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Invalid scores are `null`
    pub scores: IndexMap<MetricId, Option<f64>>,
}

impl TranscriptEntry {
    pub fn new(
        document_index: usize,
        prompt: &Prompt,
        model: &str,
        repeat: u32,
        outcome: &Result<GeneratedSummary, GenerationError>,
        record: &MetricRecord,
    ) -> Self {
        let (summary, error, attempts, latency_ms) = match outcome {
            Ok(s) => (Some(s.text.clone()), None, Some(s.attempts), Some(s.latency_ms)),
            Err(e) => (None, Some(e.to_string()), None, None),
        };

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            document_index,
            prompt_number: prompt.number,
            prompt_id: prompt.id.clone(),
            prompt: prompt.sanitized.clone(),
            model: model.to_string(),
            repeat,
            success: outcome.is_ok(),
            summary,
            error,
            attempts,
            latency_ms,
            scores: record
                .scores
                .iter()
                .map(|(m, v)| (*m, v.is_finite().then_some(*v)))
                .collect(),
        }
    }
}

/// Appends entries to a JSONL file, creating it on first write
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    path: PathBuf,
}

impl TranscriptWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &TranscriptEntry) -> Result<(), ReportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Read every entry of a transcript
pub fn read_transcript(path: impl AsRef<Path>) -> Result<Vec<TranscriptEntry>, ReportError> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(ReportError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        Prompt {
            number: 1,
            id: "pls-detailed".into(),
            text: "Summarise: secret abstract".into(),
            sanitized: "Summarise: [Abstract text not shown]".into(),
            label: "Summarise".into(),
        }
    }

    #[test]
    fn test_append_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path().join("logs").join("transcript.jsonl"));

        let mut record = MetricRecord::new();
        record.set(MetricId::Rouge1, 0.5);
        record.set(MetricId::Fkgl, f64::NAN);
        let ok = Ok(GeneratedSummary {
            text: "A summary.".into(),
            model: "gpt-4o-mini".into(),
            input_tokens: 10,
            output_tokens: 3,
            latency_ms: 42,
            attempts: 2,
        });
        writer.append(&TranscriptEntry::new(0, &prompt(), "GPT", 1, &ok, &record)).unwrap();

        let failed = Err(GenerationError::Timeout { timeout_ms: 100 });
        let failed_record = MetricRecord::failed(&[MetricId::Rouge1]);
        writer
            .append(&TranscriptEntry::new(0, &prompt(), "GPT", 2, &failed, &failed_record))
            .unwrap();

        let entries = read_transcript(writer.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].summary.as_deref(), Some("A summary."));
        assert_eq!(entries[0].attempts, Some(2));
        assert_eq!(entries[0].scores[&MetricId::Rouge1], Some(0.5));
        assert_eq!(entries[0].scores[&MetricId::Fkgl], None);
        assert!(!entries[0].prompt.contains("secret"));
        assert!(!entries[1].success);
        assert!(entries[1].error.as_deref().unwrap().contains("Timeout"));
    }
}
