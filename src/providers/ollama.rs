//! Ollama provider implementation
//!
//! Self-hosted alternative to Gemini. Uses the non-streaming `/api/generate`
//! endpoint since the engine always sends a single assembled prompt.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use super::{AnswerGenerator, GeneratorError};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
        }
    }
}

#[async_trait]
impl AnswerGenerator for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeneratorError::QuotaExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::InvalidResponse(format!(
                "{}: {}",
                status, body
            )));
        }

        let generate_response: GenerateResponse = response.json().await?;

        Ok(generate_response.response)
    }
}
