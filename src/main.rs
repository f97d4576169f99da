//! MediQ - Medical Chatbot API
//!
//! Conversational patient intake plus retrieval-grounded medical Q&A.
//! A short scripted dialogue collects the patient profile; afterwards
//! questions are answered from passages retrieved out of a vector index,
//! composed into an answer by a hosted generative model.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod retrieval;
mod routes;

use crate::config::Config;
use crate::core::{ChatEngine, SessionStore, SqliteSessionStore};
use crate::retrieval::{OllamaEmbedder, PineconeIndex, Retriever};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub chat_engine: Arc<ChatEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediq=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let prompts = config.load_prompts()?;

    // Session store
    let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(&config.db_path).await?);

    // Retrieval: query embedding + vector index
    let embedder = OllamaEmbedder::new(
        config
            .ollama_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".into()),
        config.embed_model.clone(),
    );

    let index_host = config
        .pinecone_index_host
        .clone()
        .ok_or_else(|| anyhow::anyhow!("PINECONE_INDEX_HOST is not set"))?;
    let pinecone_api_key = config
        .pinecone_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("PINECONE_API_KEY is not set"))?;
    let retriever: Arc<dyn Retriever> = Arc::new(PineconeIndex::new(
        index_host,
        pinecone_api_key,
        Box::new(embedder),
    ));

    // Generation provider
    let generator = Arc::from(providers::from_config(&config)?);

    let chat_engine = Arc::new(ChatEngine::new(
        store,
        retriever,
        generator,
        prompts,
        config.top_k,
    ));

    tracing::info!(provider = %config.provider, model = %config.model, "providers initialized");

    let state = AppState {
        config,
        chat_engine,
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🩺 MediQ API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
