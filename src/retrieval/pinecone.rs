//! Pinecone vector index adapter
//!
//! Embeds the query via the configured [`Embedder`], then runs a `/query`
//! similarity search against the index host. Passage text is expected in the
//! `text` metadata field of each match, which is how the ingestion pipeline
//! writes documents.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use async_trait::async_trait;

use super::{Embedder, Passage, RetrievalError, Retriever};

pub struct PineconeIndex {
    client: Client,
    index_host: String,
    api_key: String,
    embedder: Box<dyn Embedder>,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: String,
}

impl PineconeIndex {
    pub fn new(index_host: String, api_key: String, embedder: Box<dyn Embedder>) -> Self {
        Self {
            client: Client::new(),
            index_host,
            api_key,
            embedder,
        }
    }

    fn passages_from(response: QueryResponse) -> Vec<Passage> {
        response
            .matches
            .into_iter()
            .filter_map(|m| {
                m.metadata.map(|md| Passage {
                    text: md.text,
                    score: m.score,
                })
            })
            .filter(|p| !p.text.is_empty())
            .collect()
    }
}

#[async_trait]
impl Retriever for PineconeIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let vector = self.embedder.embed(query).await?;

        let request = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
        };

        let response = self
            .client
            .post(format!("https://{}/query", self.index_host))
            .header("Api-Key", &self.api_key)
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

        let query_response: QueryResponse = response.json().await?;

        Ok(Self::passages_from(query_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_matches() {
        let body = r#"{
            "matches": [
                {"id": "doc-1", "score": 0.92, "metadata": {"text": "Ibuprofen reduces pain and inflammation."}},
                {"id": "doc-2", "score": 0.81, "metadata": {"text": "Paracetamol relieves mild pain."}}
            ]
        }"#;

        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        let passages = PineconeIndex::passages_from(parsed);

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "Ibuprofen reduces pain and inflammation.");
        assert!(passages[0].score > passages[1].score);
    }

    #[test]
    fn test_decode_empty_result() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"matches": []}"#).unwrap();
        assert!(PineconeIndex::passages_from(parsed).is_empty());
    }

    #[test]
    fn test_matches_without_metadata_are_dropped() {
        let body = r#"{"matches": [{"id": "doc-1", "score": 0.5}]}"#;
        let parsed: QueryResponse = serde_json::from_str(body).unwrap();
        assert!(PineconeIndex::passages_from(parsed).is_empty());
    }
}
