//! Generator trait definitions for LLM API clients

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Request for a completion from a generator
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: None,
            messages,
            max_tokens,
            temperature: None,
            system_prompt: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }
}

/// Response from a generator
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
    pub latency_ms: u64,
}

/// Error types for generation calls
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    /// Worth another attempt: transport errors, timeouts, 429 and 5xx.
    /// Auth, quota and malformed requests are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Http(_) => true,
            GenerationError::RateLimited { .. } => true,
            GenerationError::Timeout { .. } => true,
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            GenerationError::EmptyResponse(_) => true,
            GenerationError::Parse(_) | GenerationError::Config(_) => false,
        }
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Trait for text generators
#[async_trait]
pub trait Generator: Send + Sync {
    /// Get the provider name (e.g., "openai", "gemini")
    fn name(&self) -> &str;

    /// Get the default model for this generator
    fn default_model(&self) -> &str;

    /// Send a completion request
    async fn complete(&self, request: &CompletionRequest) -> GenerationResult<CompletionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GenerationError::Timeout { timeout_ms: 10 }.is_retryable());
        assert!(GenerationError::RateLimited { retry_after_ms: 10 }.is_retryable());
        assert!(GenerationError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(!GenerationError::Api { status: 400, message: String::new() }.is_retryable());
        assert!(!GenerationError::Config("quota".into()).is_retryable());
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new(vec![Message::user("hi")], 100)
            .with_model("m")
            .with_temperature(0.3)
            .with_system("sys");
        assert_eq!(request.model.as_deref(), Some("m"));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.system_prompt.as_deref(), Some("sys"));
        assert_eq!(request.messages[0].role, "user");
    }
}
