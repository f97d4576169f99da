//! Application configuration

pub mod prompts;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use prompts::{PromptSet, builtin as prompts_builtin};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite file backing the session store.
    pub db_path: PathBuf,
    /// Generation provider: "gemini" or "ollama".
    pub provider: String,
    /// Model name, provider-specific.
    pub model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub ollama_url: Option<String>,
    pub pinecone_api_key: Option<String>,
    /// Host of the Pinecone index, e.g. "myindex-abc123.svc.us-east-1.pinecone.io".
    pub pinecone_index_host: Option<String>,
    /// Embedding model used for retrieval queries; must match the index.
    pub embed_model: String,
    /// Number of passages fetched per question.
    pub top_k: usize,
    /// Optional TOML file overriding prompt/reply strings.
    pub prompts_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            db_path: env::var("MEDIQ_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/mediq.db")),
            provider: env::var("MEDIQ_PROVIDER").unwrap_or_else(|_| "gemini".into()),
            model: env::var("MEDIQ_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-pro-latest".into()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            gemini_base_url: env::var("GEMINI_BASE_URL").ok(),
            ollama_url: env::var("OLLAMA_URL").ok(),
            pinecone_api_key: env::var("PINECONE_API_KEY").ok(),
            pinecone_index_host: env::var("PINECONE_INDEX_HOST").ok(),
            embed_model: env::var("MEDIQ_EMBED_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text".into()),
            top_k: env::var("MEDIQ_TOP_K")
                .ok()
                .and_then(|k| k.parse().ok())
                .unwrap_or(3),
            prompts_file: env::var("MEDIQ_PROMPTS_FILE").ok().map(PathBuf::from),
        })
    }

    /// Prompt set for this deployment: overrides from `prompts_file` when
    /// configured, built-in defaults otherwise.
    pub fn load_prompts(&self) -> anyhow::Result<PromptSet> {
        match &self.prompts_file {
            Some(path) => Ok(PromptSet::from_file(path)?),
            None => Ok(PromptSet::default()),
        }
    }
}
