//! Document retrieval over an external vector index
//!
//! Questions are answered only from retrieved passages. The index itself is
//! populated out-of-band; this layer embeds the query text and runs a
//! similarity search, nothing more.

mod embedding;
mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use embedding::OllamaEmbedder;
pub use pinecone::PineconeIndex;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One retrieved passage, ranked by similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub score: f32,
}

/// Turns text into a fixed-length vector matching the index dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// Similarity search over the document index.
///
/// Returns at most `k` passages, best first, possibly none. An empty result
/// means no grounding is available and the caller must not fabricate context.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
