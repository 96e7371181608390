//! Generator implementations

pub mod gemini;
pub mod openai;
pub mod traits;

pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, GenerationError, GenerationResult, Generator, Message,
};

use std::sync::Arc;

use crate::config::{Config, ConfigError, ModelConfig, ProviderKind};

/// A configured model under test paired with its client
#[derive(Clone)]
pub struct Model {
    pub config: ModelConfig,
    pub generator: Arc<dyn Generator>,
}

impl Model {
    pub fn new(config: ModelConfig, generator: Arc<dyn Generator>) -> Self {
        Self { config, generator }
    }

    /// Display name used in the results table
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Request for one prompt with this model's sampling settings
    pub fn request(&self, prompt: &str) -> CompletionRequest {
        let mut request = CompletionRequest::new(vec![Message::user(prompt)], self.config.max_tokens)
            .with_model(&self.config.model);
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(system) = &self.config.system_prompt {
            request = request.with_system(system);
        }
        request
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.config.name)
            .field("provider", &self.generator.name())
            .field("model", &self.config.model)
            .finish()
    }
}

/// Build a client for one model, reading its API key from the environment
pub fn create_generator(model: &ModelConfig) -> Result<Arc<dyn Generator>, ConfigError> {
    let api_key = model.resolve_api_key()?;
    let generator: Arc<dyn Generator> = match model.provider {
        ProviderKind::OpenAI => {
            let mut client = OpenAIClient::new(api_key).with_model(&model.model);
            if let Some(url) = &model.base_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
        ProviderKind::Gemini => {
            let mut client = GeminiClient::new(api_key).with_model(&model.model);
            if let Some(url) = &model.base_url {
                client = client.with_base_url(url);
            }
            Arc::new(client)
        }
    };
    Ok(generator)
}

/// Create every enabled model. A missing credential is fatal.
pub fn create_models(config: &Config) -> Result<Vec<Model>, ConfigError> {
    config
        .enabled_models()
        .into_iter()
        .map(|m| Ok(Model::new(m.clone(), create_generator(m)?)))
        .collect()
}
