//! Store contracts — the single source of relational truth.
//!
//! Components hold ids, never live object graphs; every relation
//! (entry↔owner, solution↔entry, log↔entry) is a foreign id resolved
//! through a lookup here. Multi-row mutations that the derived-data
//! invariants depend on (generation upsert+append, body-edit invalidation,
//! cascading delete, evaluation) are single trait methods, so an
//! implementation can make each one atomic and partial failure can never
//! leave a new body coexisting with artifacts computed from an old one.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::diary::{DiaryEntry, EntryFields};
use crate::models::solution::{FeedbackLog, Solution};

#[async_trait]
pub trait DiaryStore: Send + Sync {
    // ── Diary entries ────────────────────────────────────────────────────

    /// Inserts a new entry with its save-time embedding already computed.
    async fn create_entry(
        &self,
        owner_id: Uuid,
        fields: &EntryFields,
        recorded_at: DateTime<Utc>,
        embedding: Vec<f32>,
    ) -> Result<DiaryEntry, AppError>;

    async fn get_entry(&self, entry_id: Uuid) -> Result<Option<DiaryEntry>, AppError>;

    /// Entries for one owner with `recorded_at` in `[start, end)`, newest first.
    async fn entries_between(
        &self,
        owner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiaryEntry>, AppError>;

    /// The owner's most recent entries by `recorded_at`, newest first.
    async fn recent_entries(&self, owner_id: Uuid, limit: i64) -> Result<Vec<DiaryEntry>, AppError>;

    /// Replaces the stored embedding. Used by the generation path to keep
    /// the entry's vector fresh; the body itself is unchanged.
    async fn set_embedding(&self, entry_id: Uuid, embedding: &[f32]) -> Result<(), AppError>;

    /// Retrieval candidates: the owner's other entries that already carry
    /// an embedding. The entry under evaluation is always excluded.
    async fn embedded_candidates(
        &self,
        owner_id: Uuid,
        exclude: Uuid,
    ) -> Result<Vec<(Uuid, Vec<f32>)>, AppError>;

    /// Field-only update for edits that did not touch the body. Embedding,
    /// solution, and feedback logs survive untouched.
    async fn update_entry_fields(
        &self,
        entry_id: Uuid,
        fields: &EntryFields,
    ) -> Result<(), AppError>;

    /// Body-change invalidation, one atomic unit: store the fresh
    /// embedding, delete all feedback logs, delete the solution, apply the
    /// field updates.
    async fn invalidate_and_update(
        &self,
        entry_id: Uuid,
        fields: &EntryFields,
        new_embedding: &[f32],
    ) -> Result<(), AppError>;

    /// Deletes the entry and cascades to its solution and feedback logs.
    async fn delete_entry(&self, entry_id: Uuid) -> Result<(), AppError>;

    // ── Solutions and feedback logs ──────────────────────────────────────

    async fn get_solution(&self, solution_id: Uuid) -> Result<Option<Solution>, AppError>;

    async fn solution_for_entry(&self, entry_id: Uuid) -> Result<Option<Solution>, AppError>;

    /// One atomic unit per generation: upsert the entry's solution
    /// (overwriting content and resetting the score if one exists) and
    /// append a feedback-log row with the same content. The append always
    /// happens; the log is the audit trail of every generation.
    async fn record_generation(&self, entry_id: Uuid, content: &str) -> Result<Solution, AppError>;

    /// Sets the solution's score and the score of the entry's most recent
    /// feedback-log row in one unit. A missing log row is a no-op for the
    /// log half, since scoring is best-effort annotation of history.
    async fn apply_evaluation(
        &self,
        solution_id: Uuid,
        entry_id: Uuid,
        score: i32,
    ) -> Result<(), AppError>;

    /// All feedback-log rows for the given entries, preserving the order of
    /// `entry_ids` (callers pass ranked retrieval output), oldest log first
    /// within an entry. Score filtering is the prompt composer's concern.
    async fn feedback_for_entries(&self, entry_ids: &[Uuid]) -> Result<Vec<FeedbackLog>, AppError>;
}
