mod config;
mod db;
mod diary;
mod errors;
mod llm_client;
mod models;
mod retrieval;
mod routes;
mod solution;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, init_schema};
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::solution::orchestrator::EntryLocks;
use crate::state::AppState;
use crate::store::postgres::PgDiaryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (panics on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting diary API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    init_schema(&pool).await?;

    // Initialize the Gemini client; it backs both provider seams
    let gemini = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.embedding_model.clone(),
        config.chat_model.clone(),
    ));
    info!(
        "Gemini client initialized (embedding: {}, chat: {})",
        config.embedding_model, config.chat_model
    );

    // Build app state
    let state = AppState {
        store: Arc::new(PgDiaryStore::new(pool)),
        embedder: gemini.clone(),
        completer: gemini,
        locks: Arc::new(EntryLocks::new()),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
