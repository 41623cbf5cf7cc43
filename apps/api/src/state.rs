use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::{CompletionClient, EmbeddingClient};
use crate::solution::orchestrator::EntryLocks;
use crate::store::DiaryStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Both provider traits are backed by the same `GeminiClient` in production;
/// they stay separate seams so tests can stub embedding and completion
/// independently.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DiaryStore>,
    pub embedder: Arc<dyn EmbeddingClient>,
    pub completer: Arc<dyn CompletionClient>,
    /// Per-entry generation mutexes; at most one in-flight generation per entry.
    pub locks: Arc<EntryLocks>,
    pub config: Config,
}
