//! Diary entry lifecycle — the mutation hooks the CRUD surface calls to
//! keep derived data consistent with the entry text.
//!
//! The one rule that matters here: an entry's embedding, solution, and
//! feedback log were all computed from a specific body text. Any change to
//! that text, however small, invalidates all three in the same store-level
//! unit of work. Whitespace counts: the comparison is strict string
//! equality, not a semantic diff.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{EmbeddingClient, TaskType};
use crate::models::diary::{DiaryEntry, EntryFields};
use crate::solution::orchestrator::EntryLocks;
use crate::store::DiaryStore;

/// How many entries the recent view returns.
const RECENT_LIMIT: i64 = 5;

/// Payload for creating an entry. `recorded_at` is the user-chosen moment;
/// it defaults to now and can never be edited afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDiaryEntry {
    pub emotion: String,
    pub intensity: i32,
    pub body: String,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// A diary entry as the read surface returns it, with the current solution
/// attached when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct DiaryEntryView {
    pub id: Uuid,
    pub emotion: String,
    pub intensity: i32,
    pub body: String,
    pub recorded_at: DateTime<Utc>,
    pub solution: Option<SolutionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolutionInfo {
    pub id: Uuid,
    pub content: String,
    pub eval_score: i32,
}

/// Creates a diary entry with its save-time embedding.
///
/// The embedding is computed in document mode: this entry will be searched
/// *against* later, not used as a query. Embedding failure aborts the save:
/// an entry without a vector would silently drop out of retrieval.
pub async fn save_diary(
    store: &dyn DiaryStore,
    embedder: &dyn EmbeddingClient,
    owner_id: Uuid,
    new_entry: NewDiaryEntry,
) -> Result<DiaryEntry, AppError> {
    let text = DiaryEntry::embedding_text(&new_entry.emotion, &new_entry.body);
    let embedding = embedder.embed(&text, TaskType::RetrievalDocument).await?;

    let fields = EntryFields {
        emotion: new_entry.emotion,
        intensity: new_entry.intensity,
        body: new_entry.body,
    };
    let recorded_at = new_entry.recorded_at.unwrap_or_else(Utc::now);

    let entry = store
        .create_entry(owner_id, &fields, recorded_at, embedding)
        .await?;
    info!("Created diary entry {} for user {owner_id}", entry.id);
    Ok(entry)
}

/// Applies an edit to a diary entry.
///
/// A changed body triggers the full invalidation path: fresh document-mode
/// embedding, all feedback logs deleted, solution deleted, fields applied,
/// all in one atomic store unit. An unchanged body applies the field updates only
/// and leaves every derived artifact untouched.
///
/// Takes the entry's lock for the whole edit, so a generation in flight
/// for the same entry finishes first and its output is then invalidated
/// along with the rest.
pub async fn update_diary(
    store: &dyn DiaryStore,
    embedder: &dyn EmbeddingClient,
    locks: &EntryLocks,
    owner_id: Uuid,
    entry_id: Uuid,
    fields: EntryFields,
) -> Result<(), AppError> {
    let _lock = locks.acquire(entry_id).await;

    let entry = store
        .get_entry(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Diary entry {entry_id} not found")))?;

    if entry.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    if entry.body != fields.body {
        let text = DiaryEntry::embedding_text(&fields.emotion, &fields.body);
        let new_embedding = embedder.embed(&text, TaskType::RetrievalDocument).await?;

        store
            .invalidate_and_update(entry_id, &fields, &new_embedding)
            .await?;
        info!("Entry {entry_id} body changed; derived data invalidated");
    } else {
        store.update_entry_fields(entry_id, &fields).await?;
    }

    Ok(())
}

/// Deletes a diary entry, cascading to its solution and feedback logs.
/// Takes the entry's lock, so a generation in flight finishes before the
/// cascade removes its output.
pub async fn delete_diary(
    store: &dyn DiaryStore,
    locks: &EntryLocks,
    owner_id: Uuid,
    entry_id: Uuid,
) -> Result<(), AppError> {
    let _lock = locks.acquire(entry_id).await;

    let entry = store
        .get_entry(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Diary entry {entry_id} not found")))?;

    if entry.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    store.delete_entry(entry_id).await?;
    info!("Deleted diary entry {entry_id}");
    Ok(())
}

/// Entries for one calendar month, newest first, solutions attached.
pub async fn monthly_records(
    store: &dyn DiaryStore,
    owner_id: Uuid,
    year: i32,
    month: u32,
) -> Result<Vec<DiaryEntryView>, AppError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("Invalid year/month: {year}-{month}")))?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::Validation(format!("Invalid year/month: {year}-{month}")))?;

    records_between(store, owner_id, start, end).await
}

/// Entries for a single date, newest first, solutions attached.
pub async fn daily_records(
    store: &dyn DiaryStore,
    owner_id: Uuid,
    date: NaiveDate,
) -> Result<Vec<DiaryEntryView>, AppError> {
    let end = date
        .succ_opt()
        .ok_or_else(|| AppError::Validation(format!("Invalid date: {date}")))?;
    records_between(store, owner_id, date, end).await
}

/// The owner's most recent entries, solutions attached.
pub async fn recent_records(
    store: &dyn DiaryStore,
    owner_id: Uuid,
) -> Result<Vec<DiaryEntryView>, AppError> {
    let entries = store.recent_entries(owner_id, RECENT_LIMIT).await?;
    attach_solutions(store, entries).await
}

async fn records_between(
    store: &dyn DiaryStore,
    owner_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DiaryEntryView>, AppError> {
    let start = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let end = end.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AppError::Validation("Invalid date range".to_string()));
    };

    let entries = store.entries_between(owner_id, start, end).await?;
    attach_solutions(store, entries).await
}

async fn attach_solutions(
    store: &dyn DiaryStore,
    entries: Vec<DiaryEntry>,
) -> Result<Vec<DiaryEntryView>, AppError> {
    let mut views = Vec::with_capacity(entries.len());
    for entry in entries {
        let solution = store.solution_for_entry(entry.id).await?.map(|s| SolutionInfo {
            id: s.id,
            content: s.content,
            eval_score: s.eval_score,
        });
        views.push(DiaryEntryView {
            id: entry.id,
            emotion: entry.emotion,
            intensity: entry.intensity,
            body: entry.body,
            recorded_at: entry.recorded_at,
            solution,
        });
    }
    Ok(views)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
