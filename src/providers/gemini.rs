//! Gemini provider implementation

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use super::{AnswerGenerator, GeneratorError};

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    fn text_from(response: GenerateContentResponse) -> Result<String, GeneratorError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GeneratorError::InvalidResponse("no candidates".to_string()))?;

        let content = candidate
            .content
            .ok_or_else(|| GeneratorError::InvalidResponse("candidate without content".to_string()))?;

        Ok(content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl AnswerGenerator for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
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

        let completion: GenerateContentResponse = response.json().await?;

        Self::text_from(completion)
    }
}
