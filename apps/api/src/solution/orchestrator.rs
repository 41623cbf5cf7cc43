//! Solution generation — orchestrates the full RAG pipeline.
//!
//! Flow: load entry → query embedding (also refreshes the stored vector) →
//!       cosine top-K over the owner's embedded history → prompt composition
//!       from scored feedback → completion → solution upsert + log append.
//!
//! The embedding call is a hard failure (a wrong vector silently corrupts
//! future retrieval); the completion call is a soft failure (a missing
//! reply is immediately visible and recoverable by retrying), so on
//! provider trouble the fallback text is persisted and the call still
//! succeeds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::{CompletionClient, EmbeddingClient, TaskType};
use crate::models::diary::DiaryEntry;
use crate::retrieval::rank_top_k;
use crate::solution::composer::build_solution_prompt;
use crate::store::DiaryStore;

/// How many similar past entries feed the prompt.
const TOP_K_SIMILAR: usize = 10;

/// Persisted as the solution content when the completion provider fails.
/// The retrieval and prompt work is not thrown away; the user sees this,
/// can retry, and the audit log stays complete.
pub const FALLBACK_SOLUTION: &str =
    "Sorry - I couldn't come up with a suggestion right now. Please try again in a moment.";

/// What the caller gets back from a generation: the solution's identity and
/// the content that was persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SolutionView {
    pub solution_id: Uuid,
    pub content: String,
}

/// Per-entry mutual exclusion for every operation that touches derived
/// data: generation, body edits, deletion. At most one of them runs per
/// entry at a time, so an edit can never land between prompt composition
/// and the solution write of a racing generation.
#[derive(Default)]
pub struct EntryLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

/// Holds the entry's mutex. Dropping it releases the mutex and removes
/// the map slot when no other task holds or awaits it, so the map does
/// not grow with every entry ever touched.
pub struct EntryLockGuard<'a> {
    locks: &'a EntryLocks,
    entry_id: Uuid,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for EntryLockGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps an Arc handle alive; it must go before
        // release() can see the slot as unreferenced.
        self.guard.take();
        self.locks.release(self.entry_id);
    }
}

impl EntryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, entry_id: Uuid) -> EntryLockGuard<'_> {
        let slot = self
            .inner
            .lock()
            .expect("entry lock map poisoned")
            .entry(entry_id)
            .or_default()
            .clone();
        let guard = slot.lock_owned().await;
        EntryLockGuard {
            locks: self,
            entry_id,
            guard: Some(guard),
        }
    }

    fn release(&self, entry_id: Uuid) {
        let mut inner = self.inner.lock().expect("entry lock map poisoned");
        if let Some(slot) = inner.get(&entry_id) {
            // Strong count 1 means the map holds the only handle: the
            // mutex is free and nobody is queued on it.
            if Arc::strong_count(slot) == 1 {
                inner.remove(&entry_id);
            }
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.inner.lock().expect("entry lock map poisoned").len()
    }
}

/// Generates (or regenerates) the solution for a diary entry.
///
/// The fresh query embedding is persisted onto the entry before retrieval.
/// This doubles as the save-time embedding refresh, and it is an accepted
/// side effect even if a later step fails.
pub async fn generate_solution(
    store: &dyn DiaryStore,
    embedder: &dyn EmbeddingClient,
    completer: &dyn CompletionClient,
    locks: &EntryLocks,
    owner_id: Uuid,
    entry_id: Uuid,
) -> Result<SolutionView, AppError> {
    // Held across the entry read and every write, so a racing edit or
    // delete serializes fully before or fully after this generation and
    // the prompt is always composed from the committed body.
    let _lock = locks.acquire(entry_id).await;

    let entry = store
        .get_entry(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Diary entry {entry_id} not found")))?;

    if entry.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    let query_text = DiaryEntry::embedding_text(&entry.emotion, &entry.body);
    let embedding = embedder.embed(&query_text, TaskType::RetrievalQuery).await?;
    store.set_embedding(entry_id, &embedding).await?;

    let candidates = store.embedded_candidates(owner_id, entry_id).await?;
    let ranked = rank_top_k(&embedding, &candidates, TOP_K_SIMILAR);
    info!(
        "Retrieved {} of {} candidate entries for entry {entry_id}",
        ranked.len(),
        candidates.len()
    );

    let history = store.feedback_for_entries(&ranked).await?;
    let prompt = build_solution_prompt(&entry, &history);

    let content = match completer.complete(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Completion provider failed for entry {entry_id}: {e}");
            FALLBACK_SOLUTION.to_string()
        }
    };

    let solution = store.record_generation(entry_id, &content).await?;
    info!("Generated solution {} for entry {entry_id}", solution.id);

    Ok(SolutionView {
        solution_id: solution.id,
        content: solution.content,
    })
}

/// Attaches a user score to a solution and to the feedback-log row of the
/// generation that produced it.
pub async fn evaluate_solution(
    store: &dyn DiaryStore,
    config: &Config,
    owner_id: Uuid,
    solution_id: Uuid,
    score: i32,
) -> Result<(), AppError> {
    let solution = store
        .get_solution(solution_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Solution {solution_id} not found")))?;

    let entry = store
        .get_entry(solution.entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Diary entry {} not found", solution.entry_id)))?;

    if entry.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    // 0 is reserved for "unscored" and is never accepted here.
    if score < config.min_eval_score || score > config.max_eval_score {
        return Err(AppError::Validation(format!(
            "score must be between {} and {}",
            config.min_eval_score, config.max_eval_score
        )));
    }

    store.apply_evaluation(solution_id, solution.entry_id, score).await
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;

    use crate::llm_client::ProviderError;
    use crate::models::diary::EntryFields;
    use crate::store::memory::InMemoryDiaryStore;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            gemini_api_key: String::new(),
            embedding_model: String::new(),
            chat_model: String::new(),
            port: 0,
            rust_log: String::new(),
            min_eval_score: 1,
            max_eval_score: 5,
        }
    }

    fn fields(emotion: &str, intensity: i32, body: &str) -> EntryFields {
        EntryFields {
            emotion: emotion.to_string(),
            intensity,
            body: body.to_string(),
        }
    }

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn embed(&self, _text: &str, _task: TaskType) -> Result<Vec<f32>, ProviderError> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedder {
        async fn embed(&self, _text: &str, _task: TaskType) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Api {
                status: 500,
                message: "embedding backend down".to_string(),
            })
        }
    }

    struct EchoCompleter(&'static str);

    #[async_trait]
    impl CompletionClient for EchoCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    /// Returns scripted replies in sequence.
    struct SeqCompleter(Mutex<VecDeque<&'static str>>);

    impl SeqCompleter {
        fn new(replies: &[&'static str]) -> Self {
            Self(Mutex::new(replies.iter().copied().collect()))
        }
    }

    #[async_trait]
    impl CompletionClient for SeqCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok(self.0.lock().unwrap().pop_front().unwrap().to_string())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl CompletionClient for FailingCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            Err(ProviderError::EmptyContent)
        }
    }

    /// Captures the prompt it was handed.
    struct CapturingCompleter(Mutex<Option<String>>);

    #[async_trait]
    impl CompletionClient for CapturingCompleter {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            *self.0.lock().unwrap() = Some(prompt.to_string());
            Ok("ok".to_string())
        }
    }

    async fn seed_entry(store: &InMemoryDiaryStore, owner: Uuid, body: &str) -> Uuid {
        store
            .create_entry(owner, &fields("sadness", 70, body), Utc::now(), vec![1.0, 0.0])
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_generate_creates_unscored_solution_and_single_log() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        let view = generate_solution(
            &store,
            &FixedEmbedder(vec![0.5, 0.5]),
            &EchoCompleter("Make yourself a warm cup of tea."),
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();

        assert_eq!(view.content, "Make yourself a warm cup of tea.");

        let solution = store.solution_for_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(solution.id, view.solution_id);
        assert_eq!(solution.eval_score, 0);

        let logs = store.feedback_for_entries(&[entry_id]).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].content, view.content);
        assert_eq!(logs[0].eval_score, 0);
    }

    #[tokio::test]
    async fn test_generate_refreshes_stored_embedding() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        generate_solution(
            &store,
            &FixedEmbedder(vec![0.25, 0.75]),
            &EchoCompleter("ok"),
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();

        let entry = store.get_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.embedding, Some(vec![0.25, 0.75]));
    }

    #[tokio::test]
    async fn test_second_generation_overwrites_solution_and_appends_log() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();
        let embedder = FixedEmbedder(vec![1.0]);
        let completer = SeqCompleter::new(&["first reply", "second reply"]);

        let first = generate_solution(&store, &embedder, &completer, &locks, owner, entry_id)
            .await
            .unwrap();
        let second = generate_solution(&store, &embedder, &completer, &locks, owner, entry_id)
            .await
            .unwrap();

        assert_eq!(first.solution_id, second.solution_id);
        assert_eq!(second.content, "second reply");

        let solution = store.solution_for_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(solution.content, "second reply");

        let logs = store.feedback_for_entries(&[entry_id]).await.unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_body_edit_then_regeneration_yields_fresh_pair() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();
        let embedder = FixedEmbedder(vec![1.0]);
        let completer = SeqCompleter::new(&["stale advice", "fresh advice"]);

        generate_solution(&store, &embedder, &completer, &locks, owner, entry_id)
            .await
            .unwrap();

        store
            .invalidate_and_update(entry_id, &fields("sadness", 50, "it got better"), &[0.5])
            .await
            .unwrap();
        assert!(store.solution_for_entry(entry_id).await.unwrap().is_none());
        assert!(store.feedback_for_entries(&[entry_id]).await.unwrap().is_empty());

        let view = generate_solution(&store, &embedder, &completer, &locks, owner, entry_id)
            .await
            .unwrap();
        assert_eq!(view.content, "fresh advice");

        let solution = store.solution_for_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(solution.eval_score, 0);
        let logs = store.feedback_for_entries(&[entry_id]).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].content, "fresh advice");
    }

    #[tokio::test]
    async fn test_generate_unknown_entry_is_not_found() {
        let store = InMemoryDiaryStore::new();
        let locks = EntryLocks::new();

        let result = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("ok"),
            &locks,
            Uuid::new_v4(),
            Uuid::new_v4(),
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_generate_for_other_owner_is_forbidden() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "private thoughts").await;
        let locks = EntryLocks::new();

        let result = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("ok"),
            &locks,
            Uuid::new_v4(),
            entry_id,
        )
        .await;

        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_with_no_writes() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        let result = generate_solution(
            &store,
            &FailingEmbedder,
            &EchoCompleter("never reached"),
            &locks,
            owner,
            entry_id,
        )
        .await;

        assert!(matches!(result, Err(AppError::Provider(_))));
        let entry = store.get_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.embedding, Some(vec![1.0, 0.0]), "save-time vector intact");
        assert!(store.solution_for_entry(entry_id).await.unwrap().is_none());
        assert!(store.feedback_for_entries(&[entry_id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_persists_fallback() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        let view = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &FailingCompleter,
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();

        assert_eq!(view.content, FALLBACK_SOLUTION);
        let solution = store.solution_for_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(solution.content, FALLBACK_SOLUTION);
        let logs = store.feedback_for_entries(&[entry_id]).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].content, FALLBACK_SOLUTION);

        // The embedding refresh is an accepted side effect of the attempt.
        let entry = store.get_entry(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.embedding, Some(vec![1.0]));
    }

    #[tokio::test]
    async fn test_prompt_carries_scored_history_from_similar_entry() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let config = test_config();
        let locks = EntryLocks::new();
        let embedder = FixedEmbedder(vec![1.0, 0.0]);

        // A past entry with a highly rated piece of advice.
        let past_id = seed_entry(&store, owner, "awful commute").await;
        let past = generate_solution(
            &store,
            &embedder,
            &EchoCompleter("Step outside for two minutes."),
            &locks,
            owner,
            past_id,
        )
        .await
        .unwrap();
        evaluate_solution(&store, &config, owner, past.solution_id, 5)
            .await
            .unwrap();

        let current_id = seed_entry(&store, owner, "rough day at work").await;
        let capturing = CapturingCompleter(Mutex::new(None));
        generate_solution(&store, &embedder, &capturing, &locks, owner, current_id)
            .await
            .unwrap();

        let prompt = capturing.0.lock().unwrap().take().unwrap();
        assert!(prompt.contains("Step outside for two minutes."));
        assert!(prompt.contains("(Score: 5/5)"));
        assert!(prompt.contains("rough day at work"));
    }

    #[tokio::test]
    async fn test_concurrent_generations_serialize_per_entry() {
        let store = Arc::new(InMemoryDiaryStore::new());
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();
        let embedder = FixedEmbedder(vec![1.0]);
        let completer = SeqCompleter::new(&["reply a", "reply b"]);

        let (a, b) = tokio::join!(
            generate_solution(store.as_ref(), &embedder, &completer, &locks, owner, entry_id),
            generate_solution(store.as_ref(), &embedder, &completer, &locks, owner, entry_id),
        );
        a.unwrap();
        b.unwrap();

        // One solution row, two log rows, no interleaved half-writes.
        let solution = store.solution_for_entry(entry_id).await.unwrap().unwrap();
        assert!(solution.content == "reply a" || solution.content == "reply b");
        let logs = store.feedback_for_entries(&[entry_id]).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(locks.slot_count(), 0, "lock slot dropped once both finish");
    }

    #[tokio::test]
    async fn test_lock_slots_are_pruned_after_use() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("ok"),
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();
        assert_eq!(locks.slot_count(), 0);

        // Error exits drop their slot too.
        let missing = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("ok"),
            &locks,
            Uuid::new_v4(),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
        assert_eq!(locks.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_updates_solution_and_latest_log() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let config = test_config();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        let view = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("Take a deep breath."),
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();

        evaluate_solution(&store, &config, owner, view.solution_id, 4)
            .await
            .unwrap();

        let solution = store.get_solution(view.solution_id).await.unwrap().unwrap();
        assert_eq!(solution.eval_score, 4);
        let logs = store.feedback_for_entries(&[entry_id]).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].eval_score, 4);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_out_of_range_scores() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let config = test_config();
        let entry_id = seed_entry(&store, owner, "rough day at work").await;
        let locks = EntryLocks::new();

        let view = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("ok"),
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();

        for score in [0, -1, 6] {
            let result = evaluate_solution(&store, &config, owner, view.solution_id, score).await;
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "score {score} must be rejected"
            );
        }

        let solution = store.get_solution(view.solution_id).await.unwrap().unwrap();
        assert_eq!(solution.eval_score, 0, "rejected scores leave no partial writes");
    }

    #[tokio::test]
    async fn test_evaluate_unknown_solution_is_not_found() {
        let store = InMemoryDiaryStore::new();
        let config = test_config();
        let result =
            evaluate_solution(&store, &config, Uuid::new_v4(), Uuid::new_v4(), 3).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_evaluate_for_other_owner_is_forbidden() {
        let store = InMemoryDiaryStore::new();
        let owner = Uuid::new_v4();
        let entry_id = seed_entry(&store, owner, "private").await;
        let locks = EntryLocks::new();

        let view = generate_solution(
            &store,
            &FixedEmbedder(vec![1.0]),
            &EchoCompleter("ok"),
            &locks,
            owner,
            entry_id,
        )
        .await
        .unwrap();

        let result =
            evaluate_solution(&store, &test_config(), Uuid::new_v4(), view.solution_id, 3).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }
}
