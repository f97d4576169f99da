//! Query embedding via Ollama

use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use super::{Embedder, RetrievalError};

pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let request = EmbeddingsRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::InvalidResponse(format!(
                "{}: {}",
                status, body
            )));
        }

        let embeddings: EmbeddingsResponse = response.json().await?;

        if embeddings.embedding.is_empty() {
            return Err(RetrievalError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }

        Ok(embeddings.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_embeddings_response() {
        let body = r#"{"embedding": [0.1, -0.25, 0.5]}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.embedding.len(), 3);
    }
}
