//! Model-based metrics served by an external HTTP scoring service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{MetricId, ScoreInput, Scorer, ScoringError, ScoringResult};
use crate::config::{CompareWith, ConfigError, RemoteScorerConfig};

/// Client for one remote metric (BERTScore, AlignScore, SummaC)
pub struct RemoteScorer {
    metric: [MetricId; 1],
    name: String,
    endpoint: String,
    compare_with: CompareWith,
    api_key: Option<String>,
    http_client: Client,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    metric: &'a str,
    candidate: &'a str,
    reference: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Single { score: f64 },
    PrecisionRecall {
        #[allow(dead_code)]
        precision: f64,
        #[allow(dead_code)]
        recall: f64,
        f1: f64,
    },
}

impl RemoteScorer {
    pub fn new(metric: MetricId, endpoint: impl Into<String>) -> Self {
        Self {
            metric: [metric],
            name: format!("remote-{}", metric.key()),
            endpoint: endpoint.into(),
            compare_with: metric.default_comparison(),
            api_key: None,
            http_client: Client::new(),
        }
    }

    /// Build from `[scoring.remote.<metric>]`
    pub fn from_config(metric: MetricId, config: &RemoteScorerConfig) -> Result<Self, ConfigError> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client for {}: {}", metric, e)))?;

        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| ConfigError::MissingCredential {
                var: var.clone(),
                model: format!("{} scorer", metric),
            })?),
            None => None,
        };

        let mut scorer = Self::new(metric, config.endpoint.clone());
        scorer.http_client = http_client;
        scorer.api_key = api_key;
        if let Some(compare_with) = config.compare_with {
            scorer = scorer.with_compare_with(compare_with);
        }
        Ok(scorer)
    }

    pub fn with_compare_with(mut self, compare_with: CompareWith) -> Self {
        self.compare_with = compare_with;
        self
    }

    fn comparison_text<'a>(&self, input: &ScoreInput<'a>) -> &'a str {
        match self.compare_with {
            CompareWith::Reference => input.reference,
            CompareWith::Source => input.source,
        }
    }
}

/// Extract the score from a service response body
fn parse_response(body: &str) -> ScoringResult<f64> {
    let response: ScoreResponse =
        serde_json::from_str(body).map_err(|e| ScoringError::Parse(format!("{}: {}", e, body)))?;
    Ok(match response {
        ScoreResponse::Single { score } => score,
        ScoreResponse::PrecisionRecall { f1, .. } => f1,
    })
}

#[async_trait]
impl Scorer for RemoteScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &[MetricId] {
        &self.metric
    }

    async fn score(&self, input: &ScoreInput<'_>) -> ScoringResult<Vec<(MetricId, f64)>> {
        let metric = self.metric[0];
        let body = ScoreRequest {
            metric: metric.key(),
            candidate: input.candidate,
            reference: self.comparison_text(input),
        };

        let mut request = self.http_client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ScoringError::Service {
                status: status.as_u16(),
                message: text,
            });
        }

        tracing::debug!("{} responded: {}", self.name, text);
        Ok(vec![(metric, parse_response(&text)?)])
    }
}
