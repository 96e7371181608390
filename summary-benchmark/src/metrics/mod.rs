//! Summary scoring: metric identifiers, per-evaluation records and scorers

pub mod readability;
pub mod remote;
pub mod rouge;

pub use readability::{ColemanLiau, DaleChall, FleschKincaid, TextStats};
pub use remote::RemoteScorer;
pub use rouge::{RougeScore, RougeScorer};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{CompareWith, Config, ConfigError};

/// Metrics understood by the benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricId {
    #[serde(rename = "rouge1")]
    Rouge1,
    #[serde(rename = "rouge2")]
    Rouge2,
    #[serde(rename = "rougeL")]
    RougeL,
    #[serde(rename = "bertscore")]
    BertScore,
    #[serde(rename = "fkgl")]
    Fkgl,
    #[serde(rename = "dcrs")]
    Dcrs,
    #[serde(rename = "cli")]
    Cli,
    #[serde(rename = "alignscore")]
    AlignScore,
    #[serde(rename = "summac", alias = "summaC")]
    SummaC,
}

impl MetricId {
    pub fn all() -> Vec<MetricId> {
        vec![
            MetricId::Rouge1,
            MetricId::Rouge2,
            MetricId::RougeL,
            MetricId::BertScore,
            MetricId::Fkgl,
            MetricId::Dcrs,
            MetricId::Cli,
            MetricId::AlignScore,
            MetricId::SummaC,
        ]
    }

    /// Config / record key
    pub fn key(&self) -> &'static str {
        match self {
            MetricId::Rouge1 => "rouge1",
            MetricId::Rouge2 => "rouge2",
            MetricId::RougeL => "rougeL",
            MetricId::BertScore => "bertscore",
            MetricId::Fkgl => "fkgl",
            MetricId::Dcrs => "dcrs",
            MetricId::Cli => "cli",
            MetricId::AlignScore => "alignscore",
            MetricId::SummaC => "summac",
        }
    }

    /// Column label in reports
    pub fn label(&self) -> &'static str {
        match self {
            MetricId::Rouge1 => "ROUGE-1",
            MetricId::Rouge2 => "ROUGE-2",
            MetricId::RougeL => "ROUGE-L",
            MetricId::BertScore => "BERTScore",
            MetricId::Fkgl => "FKGL",
            MetricId::Dcrs => "DCRS",
            MetricId::Cli => "CLI",
            MetricId::AlignScore => "AlignScore",
            MetricId::SummaC => "SummaC",
        }
    }

    pub fn from_label(label: &str) -> Option<MetricId> {
        Self::all().into_iter().find(|m| m.label() == label)
    }

    /// Served by an external scoring service rather than computed here
    pub fn is_remote(&self) -> bool {
        matches!(self, MetricId::BertScore | MetricId::AlignScore | MetricId::SummaC)
    }

    /// What a remote metric compares the candidate with by default
    pub fn default_comparison(&self) -> CompareWith {
        match self {
            MetricId::AlignScore | MetricId::SummaC => CompareWith::Source,
            _ => CompareWith::Reference,
        }
    }
}

impl std::str::FromStr for MetricId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "rouge1" => Ok(MetricId::Rouge1),
            "rouge2" => Ok(MetricId::Rouge2),
            "rougel" => Ok(MetricId::RougeL),
            "bertscore" => Ok(MetricId::BertScore),
            "fkgl" => Ok(MetricId::Fkgl),
            "dcrs" => Ok(MetricId::Dcrs),
            "cli" => Ok(MetricId::Cli),
            "alignscore" => Ok(MetricId::AlignScore),
            "summac" => Ok(MetricId::SummaC),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

impl std::fmt::Display for MetricId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Scores of one (document, prompt, model, repeat) evaluation.
///
/// A metric that could not be computed holds `NaN`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub scores: IndexMap<MetricId, f64>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a failed generation: every metric is invalid
    pub fn failed(metrics: &[MetricId]) -> Self {
        Self {
            scores: metrics.iter().map(|m| (*m, f64::NAN)).collect(),
        }
    }

    pub fn set(&mut self, metric: MetricId, value: f64) {
        self.scores.insert(metric, value);
    }

    pub fn get(&self, metric: MetricId) -> Option<f64> {
        self.scores.get(&metric).copied()
    }

    /// Metrics holding a finite value
    pub fn valid_count(&self) -> usize {
        self.scores.values().filter(|v| v.is_finite()).count()
    }
}

/// Inputs available to a scorer
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    /// Generated summary
    pub candidate: &'a str,
    /// Reference summary from the dataset
    pub reference: &'a str,
    /// Source text the summary was written from
    pub source: &'a str,
}

/// Errors from a single scorer
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Text has no scorable words")]
    EmptyText,

    #[error("Word list unavailable: {0}")]
    WordList(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scoring service error: {status} - {message}")]
    Service { status: u16, message: String },

    #[error("Malformed scoring response: {0}")]
    Parse(String),
}

pub type ScoringResult<T> = Result<T, ScoringError>;

/// A metric function over one generated summary
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Scorer name used in logs
    fn name(&self) -> &str;

    /// Metrics this scorer fills
    fn metrics(&self) -> &[MetricId];

    /// Compute every metric in `metrics()`
    async fn score(&self, input: &ScoreInput<'_>) -> ScoringResult<Vec<(MetricId, f64)>>;
}

/// The scorers selected for a run
pub struct MetricSuite {
    metrics: Vec<MetricId>,
    scorers: Vec<Arc<dyn Scorer>>,
}

impl MetricSuite {
    /// Build from explicit scorers. Only values for `metrics` are kept.
    pub fn new(metrics: Vec<MetricId>, scorers: Vec<Arc<dyn Scorer>>) -> Self {
        Self { metrics, scorers }
    }

    /// Build the scorers needed by the configured metric list
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let metrics = config.experiment.metrics.clone();
        let wants = |m: MetricId| metrics.contains(&m);
        let mut scorers: Vec<Arc<dyn Scorer>> = Vec::new();

        if wants(MetricId::Rouge1) || wants(MetricId::Rouge2) || wants(MetricId::RougeL) {
            scorers.push(Arc::new(RougeScorer::new(config.scoring.rouge.use_stemmer)));
        }
        if wants(MetricId::Fkgl) {
            scorers.push(Arc::new(FleschKincaid));
        }
        if wants(MetricId::Dcrs) {
            let scorer = match &config.scoring.readability.dale_chall_words {
                Some(path) => DaleChall::from_word_list_file(path),
                None => DaleChall::unconfigured(),
            };
            scorers.push(Arc::new(scorer));
        }
        if wants(MetricId::Cli) {
            scorers.push(Arc::new(ColemanLiau));
        }
        for metric in metrics.iter().filter(|m| m.is_remote()) {
            let remote = config.remote_scorer(*metric).ok_or_else(|| {
                ConfigError::Invalid(format!("no remote scorer configured for '{}'", metric))
            })?;
            scorers.push(Arc::new(RemoteScorer::from_config(*metric, remote)?));
        }

        Ok(Self { metrics, scorers })
    }

    /// Metrics in output order
    pub fn metrics(&self) -> &[MetricId] {
        &self.metrics
    }

    /// Score one generated summary.
    ///
    /// Scorers run one after another and independently; a failing scorer
    /// leaves `NaN` in its own metrics only.
    pub async fn evaluate(&self, generated: &str, reference: &str, context: &str) -> MetricRecord {
        let input = ScoreInput {
            candidate: generated,
            reference,
            source: context,
        };
        let mut record = MetricRecord::failed(&self.metrics);

        for scorer in &self.scorers {
            let wanted: Vec<MetricId> = scorer
                .metrics()
                .iter()
                .copied()
                .filter(|m| self.metrics.contains(m))
                .collect();
            if wanted.is_empty() {
                continue;
            }

            match scorer.score(&input).await {
                Ok(values) => {
                    for (metric, value) in values {
                        if !record.scores.contains_key(&metric) {
                            continue;
                        }
                        if value.is_finite() {
                            record.set(metric, value);
                        } else {
                            tracing::warn!("{} produced a non-finite value for {}", scorer.name(), metric);
                        }
                    }
                }
                Err(e) => {
                    let lost: Vec<&str> = wanted.iter().map(|m| m.label()).collect();
                    tracing::warn!("Scorer {} failed, no {}: {}", scorer.name(), lost.join("/"), e);
                }
            }
        }

        record
    }
}
