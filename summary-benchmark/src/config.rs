//! Configuration management for the summary benchmark
//!
//! One TOML file describes a whole experiment: dataset, prompts, models,
//! repeats, metric set and output locations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::metrics::MetricId;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub prompts: Vec<PromptConfig>,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Experiment-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_experiment_name")]
    pub name: String,
    /// Dataset file (JSON array or JSON Lines)
    #[serde(default = "default_dataset_path")]
    pub dataset: PathBuf,
    /// Results CSV path
    #[serde(default = "default_output_path")]
    pub output: PathBuf,
    /// Optional JSONL transcript of every generation
    #[serde(default)]
    pub transcript: Option<PathBuf>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Repeats per (document, prompt, model)
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    /// Stop after this many usable documents
    #[serde(default)]
    pub max_documents: Option<usize>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Metrics to compute, in output column order
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricId>,
    /// Fixed delay after every generation call
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: default_experiment_name(),
            dataset: default_dataset_path(),
            output: default_output_path(),
            transcript: None,
            log_dir: default_log_dir(),
            repeats: default_repeats(),
            max_documents: None,
            failure_policy: FailurePolicy::default(),
            metrics: default_metrics(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

/// How invalid (NaN) scores are treated before averaging.
///
/// Applies to every metric of a run; a failed generation contributes NaN
/// for each metric and goes through the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Remove invalid values before computing mean/std
    #[default]
    Drop,
    /// Replace invalid values with 0.0
    ZeroFill,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Drop => "drop",
            FailurePolicy::ZeroFill => "zero_fill",
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "drop" => Ok(FailurePolicy::Drop),
            "zero_fill" | "zero" => Ok(FailurePolicy::ZeroFill),
            _ => Err(format!("Unknown failure policy: {}", s)),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dataset file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub format: DatasetFormat,
    #[serde(default = "default_abstract_field")]
    pub abstract_field: String,
    /// Candidate field names for the reference summary, first match wins
    #[serde(default = "default_reference_fields")]
    pub reference_fields: Vec<String>,
    #[serde(default = "default_title_field")]
    pub title_field: String,
    #[serde(default = "default_year_field")]
    pub year_field: String,
    #[serde(default = "default_keywords_field")]
    pub keywords_field: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            format: DatasetFormat::default(),
            abstract_field: default_abstract_field(),
            reference_fields: default_reference_fields(),
            title_field: default_title_field(),
            year_field: default_year_field(),
            keywords_field: default_keywords_field(),
        }
    }
}

/// Dataset file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// Pick by file extension
    #[default]
    Auto,
    Json,
    JsonLines,
}

/// Generation call settings shared by all models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Truncate generated summaries to this many words
    #[serde(default)]
    pub max_summary_words: Option<usize>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
            max_summary_words: None,
        }
    }
}

/// Key-sentence extraction before prompting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub strategy: ExtractionStrategy,
    #[serde(default = "default_extract_sentences")]
    pub sentences: usize,
    /// Model name used by the `model` strategy
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::default(),
            sentences: default_extract_sentences(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    #[default]
    None,
    LexRank,
    Model,
}

/// Generator backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(alias = "gpt")]
    OpenAI,
    #[serde(alias = "google")]
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variable holding the API key unless overridden
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// One generator under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Display name, used in the output table
    pub name: String,
    pub provider: ProviderKind,
    /// Provider model id
    pub model: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ModelConfig {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    /// Read this model's API key from the environment
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        let var = self.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential {
                var: var.to_string(),
                model: self.name.clone(),
            }),
        }
    }
}

/// A prompt variant; either a built-in id or an inline template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub id: String,
    #[serde(default)]
    pub builtin: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    /// Text for the "Prompt Text" column
    #[serde(default)]
    pub label: Option<String>,
}

/// Scorer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub rouge: RougeConfig,
    #[serde(default)]
    pub readability: ReadabilityConfig,
    /// Model-based metrics served over HTTP, keyed by metric id
    #[serde(default)]
    pub remote: IndexMap<String, RemoteScorerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RougeConfig {
    #[serde(default = "default_true")]
    pub use_stemmer: bool,
}

impl Default for RougeConfig {
    fn default() -> Self {
        Self { use_stemmer: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadabilityConfig {
    /// Dale-Chall easy word list, one word per line
    #[serde(default)]
    pub dale_chall_words: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteScorerConfig {
    pub endpoint: String,
    /// Text the candidate is compared with; metric default when unset
    #[serde(default)]
    pub compare_with: Option<CompareWith>,
    #[serde(default = "default_scorer_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareWith {
    /// The reference summary
    Reference,
    /// The source abstract
    Source,
}

// Default value functions
fn default_true() -> bool { true }
fn default_experiment_name() -> String { "pls-benchmark".to_string() }
fn default_dataset_path() -> PathBuf { PathBuf::from("data/plos_val.json") }
fn default_output_path() -> PathBuf { PathBuf::from("outputs/results.csv") }
fn default_log_dir() -> PathBuf { PathBuf::from("outputs/logs") }
fn default_repeats() -> u32 { 3 }
fn default_pacing_ms() -> u64 { 1000 }
fn default_metrics() -> Vec<MetricId> {
    vec![MetricId::Rouge1, MetricId::Rouge2, MetricId::RougeL, MetricId::Fkgl, MetricId::Cli]
}
fn default_abstract_field() -> String { "abstract".to_string() }
fn default_reference_fields() -> Vec<String> {
    vec![
        "summary".to_string(),
        "plain language summary".to_string(),
        "referenceSummary".to_string(),
        "reference_summary".to_string(),
    ]
}
fn default_title_field() -> String { "title".to_string() }
fn default_year_field() -> String { "year".to_string() }
fn default_keywords_field() -> String { "keywords".to_string() }
fn default_retry_count() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 5000 }
fn default_max_retry_delay_ms() -> u64 { 60_000 }
fn default_timeout_ms() -> u64 { 60_000 }
fn default_extract_sentences() -> usize { 3 }
fn default_max_tokens() -> u32 { 1000 }
fn default_temperature() -> Option<f32> { Some(0.3) }
fn default_scorer_timeout_ms() -> u64 { 120_000 }

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/experiment.toml",
            "summary-benchmark/config/experiment.toml",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Models taking part in the run
    pub fn enabled_models(&self) -> Vec<&ModelConfig> {
        self.models.iter().filter(|m| m.enabled).collect()
    }

    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Remote scorer settings for a metric, if configured
    pub fn remote_scorer(&self, metric: MetricId) -> Option<&RemoteScorerConfig> {
        self.scoring.remote.get(metric.key())
    }

    /// Structural checks that must pass before any work starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        let exp = &self.experiment;
        if exp.repeats == 0 {
            return Err(ConfigError::Invalid("experiment.repeats must be at least 1".into()));
        }
        if exp.max_documents == Some(0) {
            return Err(ConfigError::Invalid("experiment.max_documents must be at least 1".into()));
        }
        if exp.metrics.is_empty() {
            return Err(ConfigError::Invalid("experiment.metrics is empty".into()));
        }

        let mut seen = HashSet::new();
        for metric in &exp.metrics {
            if !seen.insert(*metric) {
                return Err(ConfigError::Invalid(format!("metric '{}' listed twice", metric)));
            }
            if metric.is_remote() && self.remote_scorer(*metric).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}' needs a [scoring.remote.{}] endpoint",
                    metric,
                    metric.key()
                )));
            }
        }

        for key in self.scoring.remote.keys() {
            let metric: MetricId = key
                .parse()
                .map_err(|e: String| ConfigError::Invalid(format!("scoring.remote: {}", e)))?;
            if !metric.is_remote() {
                return Err(ConfigError::Invalid(format!(
                    "metric '{}' is computed locally and cannot use a remote scorer",
                    key
                )));
            }
        }

        let models = self.enabled_models();
        if models.is_empty() {
            return Err(ConfigError::Invalid("no enabled [[models]]".into()));
        }
        let mut names = HashSet::new();
        for model in &models {
            if !names.insert(model.name.as_str()) {
                return Err(ConfigError::Invalid(format!("model name '{}' used twice", model.name)));
            }
        }

        if self.prompts.is_empty() {
            return Err(ConfigError::Invalid("no [[prompts]] defined".into()));
        }
        let mut ids = HashSet::new();
        for prompt in &self.prompts {
            if !ids.insert(prompt.id.as_str()) {
                return Err(ConfigError::Invalid(format!("prompt id '{}' used twice", prompt.id)));
            }
            match (&prompt.builtin, &prompt.template) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Invalid(format!(
                        "prompt '{}' sets both builtin and template",
                        prompt.id
                    )))
                }
                (None, None) => {
                    return Err(ConfigError::Invalid(format!(
                        "prompt '{}' needs a builtin or a template",
                        prompt.id
                    )))
                }
                _ => {}
            }
        }

        if self.extraction.strategy == ExtractionStrategy::Model {
            let name = self.extraction.model.as_deref().ok_or_else(|| {
                ConfigError::Invalid("extraction.model is required for the model strategy".into())
            })?;
            if !models.iter().any(|m| m.name == name) {
                return Err(ConfigError::Invalid(format!(
                    "extraction.model '{}' is not an enabled model",
                    name
                )));
            }
        }
        if self.extraction.strategy != ExtractionStrategy::None && self.extraction.sentences == 0 {
            return Err(ConfigError::Invalid("extraction.sentences must be at least 1".into()));
        }

        Ok(())
    }

    /// Fail fast when any enabled model lacks its API key
    pub fn check_credentials(&self) -> Result<(), ConfigError> {
        for model in self.enabled_models() {
            model.resolve_api_key()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            experiment: ExperimentConfig::default(),
            dataset: DatasetConfig::default(),
            generation: GenerationConfig::default(),
            extraction: ExtractionConfig::default(),
            models: vec![
                ModelConfig {
                    name: "OpenAI GPT".to_string(),
                    provider: ProviderKind::OpenAI,
                    model: "gpt-4o-mini".to_string(),
                    enabled: true,
                    max_tokens: 1000,
                    temperature: Some(0.3),
                    system_prompt: Some("You are a helpful assistant.".to_string()),
                    api_key_env: None,
                    base_url: None,
                },
                ModelConfig {
                    name: "Google Gemini".to_string(),
                    provider: ProviderKind::Gemini,
                    model: "gemini-1.5-flash".to_string(),
                    enabled: true,
                    max_tokens: 1024,
                    temperature: Some(0.3),
                    system_prompt: None,
                    api_key_env: None,
                    base_url: None,
                },
            ],
            prompts: vec![
                PromptConfig {
                    id: "pls-detailed".to_string(),
                    builtin: Some("pls-detailed".to_string()),
                    template: None,
                    label: None,
                },
                PromptConfig {
                    id: "pls-informative".to_string(),
                    builtin: Some("pls-informative".to_string()),
                    template: None,
                    label: None,
                },
            ],
            scoring: ScoringConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing credential: {var} is not set (needed by model '{model}')")]
    MissingCredential { var: String, model: String },
}
