//! Generation provider integrations

mod gemini;
mod ollama;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The provider reported a usage quota or rate limit (HTTP 429).
    /// Distinguished so the engine can reply with the high-demand fallback.
    #[error("Provider quota exceeded")]
    QuotaExceeded,

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Prompt-to-text completion.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// Build the provider named in the configuration.
pub fn from_config(config: &Config) -> Result<Box<dyn AnswerGenerator>, GeneratorError> {
    match config.provider.to_lowercase().as_str() {
        "gemini" => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| GeneratorError::NotConfigured("GEMINI_API_KEY".into()))?;
            let base_url = config
                .gemini_base_url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into());
            Ok(Box::new(GeminiProvider::new(
                base_url,
                api_key,
                config.model.clone(),
            )))
        }
        "ollama" => {
            let url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".into());
            Ok(Box::new(OllamaProvider::new(url, config.model.clone())))
        }
        other => Err(GeneratorError::UnknownProvider(other.to_string())),
    }
}
