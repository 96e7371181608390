//! Per (prompt, model) score lists and their reduction to mean / std

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::FailurePolicy;
use crate::metrics::{MetricId, MetricRecord};
use crate::prompts::Prompt;

/// Mean and population standard deviation of one metric list
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    /// Finite values recorded
    pub valid: usize,
    /// Values recorded, including invalid ones
    pub recorded: usize,
}

/// Reduce a metric list under the run's failure policy.
///
/// With nothing left to average the result is `mean = std = 0.0`; `valid`
/// tells the caller whether that zero means anything.
pub fn summarize(values: &[f64], policy: FailurePolicy) -> MetricSummary {
    let valid = values.iter().filter(|v| v.is_finite()).count();
    let kept: Vec<f64> = match policy {
        FailurePolicy::Drop => values.iter().copied().filter(|v| v.is_finite()).collect(),
        FailurePolicy::ZeroFill => values
            .iter()
            .map(|&v| if v.is_finite() { v } else { 0.0 })
            .collect(),
    };

    if kept.is_empty() {
        return MetricSummary {
            mean: 0.0,
            std: 0.0,
            valid,
            recorded: values.len(),
        };
    }

    let n = kept.len() as f64;
    let min = kept.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = kept.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    // Rounding can push the sum-based mean a hair outside the range
    let mean = (kept.iter().sum::<f64>() / n).clamp(min, max);
    let variance = kept.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    MetricSummary {
        mean,
        std: variance.sqrt(),
        valid,
        recorded: values.len(),
    }
}

/// Identity of one output row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    prompt_number: usize,
    model: String,
}

#[derive(Debug, Clone)]
struct Cell {
    prompt_id: String,
    prompt_label: String,
    documents: BTreeSet<usize>,
    values: IndexMap<MetricId, Vec<f64>>,
}

/// Score lists collected over a run, owned by that run
#[derive(Debug, Clone)]
pub struct Accumulator {
    metrics: Vec<MetricId>,
    repeats: u32,
    cells: IndexMap<RowKey, Cell>,
}

impl Accumulator {
    pub fn new(metrics: Vec<MetricId>, repeats: u32) -> Self {
        Self {
            metrics,
            repeats,
            cells: IndexMap::new(),
        }
    }

    pub fn metrics(&self) -> &[MetricId] {
        &self.metrics
    }

    /// Add one (document, prompt, model, repeat) evaluation.
    ///
    /// Metrics absent from `record` count as invalid.
    pub fn record(&mut self, document_index: usize, prompt: &Prompt, model: &str, record: &MetricRecord) {
        let key = RowKey {
            prompt_number: prompt.number,
            model: model.to_string(),
        };
        let metrics = &self.metrics;
        let cell = self.cells.entry(key).or_insert_with(|| Cell {
            prompt_id: prompt.id.clone(),
            prompt_label: prompt.label.clone(),
            documents: BTreeSet::new(),
            values: metrics.iter().map(|m| (*m, Vec::new())).collect(),
        });

        cell.documents.insert(document_index);
        for (metric, values) in cell.values.iter_mut() {
            values.push(record.get(*metric).unwrap_or(f64::NAN));
        }
    }

    /// Number of evaluations recorded across all rows
    pub fn len(&self) -> usize {
        self.cells
            .values()
            .map(|c| c.values.values().next().map_or(0, Vec::len))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw list for one row and metric
    pub fn values(&self, prompt_number: usize, model: &str, metric: MetricId) -> Option<&[f64]> {
        let key = RowKey {
            prompt_number,
            model: model.to_string(),
        };
        self.cells
            .get(&key)
            .and_then(|c| c.values.get(&metric))
            .map(Vec::as_slice)
    }

    /// Reduce every list. Does not consume or change the accumulator.
    pub fn aggregate(&self, policy: FailurePolicy) -> Aggregation {
        let any_valid = self
            .cells
            .values()
            .flat_map(|c| c.values.values())
            .flatten()
            .any(|v| v.is_finite());
        if !any_valid {
            return Aggregation::NoScores;
        }

        let mut rows: Vec<AggregateRow> = self
            .cells
            .iter()
            .map(|(key, cell)| AggregateRow {
                prompt_number: key.prompt_number,
                prompt_id: cell.prompt_id.clone(),
                prompt_label: cell.prompt_label.clone(),
                model: key.model.clone(),
                papers_tested: cell.documents.len(),
                repeats: self.repeats,
                metrics: cell
                    .values
                    .iter()
                    .map(|(m, values)| (*m, summarize(values, policy)))
                    .collect(),
            })
            .collect();
        rows.sort_by_key(|r| r.prompt_number);

        Aggregation::Table(AggregateResult {
            metrics: self.metrics.clone(),
            failure_policy: policy,
            rows,
        })
    }
}

/// One (prompt, model) row of the results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub prompt_number: usize,
    pub prompt_id: String,
    pub prompt_label: String,
    pub model: String,
    pub papers_tested: usize,
    pub repeats: u32,
    pub metrics: IndexMap<MetricId, MetricSummary>,
}

/// Reduced results of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub metrics: Vec<MetricId>,
    pub failure_policy: FailurePolicy,
    pub rows: Vec<AggregateRow>,
}

impl AggregateResult {
    pub fn row(&self, prompt_number: usize, model: &str) -> Option<&AggregateRow> {
        self.rows
            .iter()
            .find(|r| r.prompt_number == prompt_number && r.model == model)
    }
}

/// Outcome of aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// No valid score was recorded in the whole run
    NoScores,
    Table(AggregateResult),
}

impl Aggregation {
    pub fn table(&self) -> Option<&AggregateResult> {
        match self {
            Aggregation::Table(t) => Some(t),
            Aggregation::NoScores => None,
        }
    }
}
