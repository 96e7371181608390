//! Dataset loading from JSON and JSON Lines files

use serde_json::Value;
use std::path::Path;

use super::Document;
use crate::config::{DatasetConfig, DatasetFormat};

/// Error type for dataset loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Record {index}: {message}")]
    Record { index: usize, message: String },
}

/// Load every record of a dataset file.
///
/// Records missing an abstract or reference are kept; callers check
/// [`Document::is_usable`].
pub fn load_documents(path: impl AsRef<Path>, config: &DatasetConfig) -> Result<Vec<Document>, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let format = match config.format {
        DatasetFormat::Auto => format_from_extension(path),
        explicit => explicit,
    };

    let documents = parse_documents(&content, format, config)?;
    tracing::info!("Loaded {} records from {}", documents.len(), path.display());
    Ok(documents)
}

fn format_from_extension(path: &Path) -> DatasetFormat {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
        Some(ext) if ext == "jsonl" || ext == "jsonlines" || ext == "ndjson" => DatasetFormat::JsonLines,
        _ => DatasetFormat::Json,
    }
}

/// Parse dataset content already read into memory
pub fn parse_documents(
    content: &str,
    format: DatasetFormat,
    config: &DatasetConfig,
) -> Result<Vec<Document>, LoadError> {
    let records: Vec<Value> = match format {
        DatasetFormat::JsonLines => parse_json_lines(content)?,
        DatasetFormat::Json | DatasetFormat::Auto => {
            let value: Value =
                serde_json::from_str(content).map_err(|e| LoadError::Parse(e.to_string()))?;
            match value {
                Value::Array(items) => items,
                _ => return Err(LoadError::Parse("expected a JSON array of records".to_string())),
            }
        }
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record, config))
        .collect()
}

fn parse_json_lines(content: &str) -> Result<Vec<Value>, LoadError> {
    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(line)
            .map_err(|e| LoadError::Parse(format!("line {}: {}", line_no + 1, e)))?;
        records.push(value);
    }
    Ok(records)
}

fn parse_record(index: usize, record: &Value, config: &DatasetConfig) -> Result<Document, LoadError> {
    let obj = record.as_object().ok_or_else(|| LoadError::Record {
        index,
        message: "expected a JSON object".to_string(),
    })?;

    let abstract_text = obj.get(&config.abstract_field).and_then(flatten_text).unwrap_or_default();
    let reference = config
        .reference_fields
        .iter()
        .filter_map(|field| obj.get(field).and_then(flatten_text))
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default();

    let title = obj.get(&config.title_field).and_then(flatten_text).filter(|t| !t.is_empty());
    let year = obj.get(&config.year_field).and_then(flatten_text).filter(|y| !y.is_empty());

    let keywords = match obj.get(&config.keywords_field) {
        Some(Value::Array(items)) => {
            let mut out = Vec::new();
            flatten_into(items, &mut out);
            out
        }
        Some(other) => flatten_text(other).into_iter().collect(),
        None => Vec::new(),
    };

    Ok(Document {
        index,
        abstract_text,
        reference,
        title,
        year,
        keywords,
    })
}

/// Text value of a field; nested lists are flattened and joined with spaces
pub fn flatten_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let mut parts = Vec::new();
            flatten_into(items, &mut parts);
            Some(parts.join(" "))
        }
        Value::Object(_) => None,
    }
}

fn flatten_into(items: &[Value], out: &mut Vec<String>) {
    for item in items {
        match item {
            Value::Array(nested) => flatten_into(nested, out),
            other => {
                if let Some(text) = flatten_text(other) {
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
            }
        }
    }
}
