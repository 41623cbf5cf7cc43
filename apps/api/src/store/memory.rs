#![allow(dead_code)]

//! In-memory store for tests and local development. Same contract as the
//! Postgres store; a single mutex makes every trait method atomic, which
//! is exactly the unit-of-work guarantee the contract asks for.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::diary::{DiaryEntry, EntryFields};
use crate::models::solution::{FeedbackLog, Solution};
use crate::store::DiaryStore;

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, DiaryEntry>,
    /// Keyed by entry_id, which enforces the 1:1 constraint structurally.
    solutions: HashMap<Uuid, Solution>,
    /// Insertion order doubles as creation order.
    logs: Vec<FeedbackLog>,
}

#[derive(Default)]
pub struct InMemoryDiaryStore {
    inner: Mutex<Inner>,
}

impl InMemoryDiaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiaryStore for InMemoryDiaryStore {
    async fn create_entry(
        &self,
        owner_id: Uuid,
        fields: &EntryFields,
        recorded_at: DateTime<Utc>,
        embedding: Vec<f32>,
    ) -> Result<DiaryEntry, AppError> {
        let entry = DiaryEntry {
            id: Uuid::new_v4(),
            owner_id,
            emotion: fields.emotion.clone(),
            intensity: fields.intensity,
            body: fields.body.clone(),
            recorded_at,
            created_at: Utc::now(),
            embedding: Some(embedding),
        };

        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&self, entry_id: Uuid) -> Result<Option<DiaryEntry>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.entries.get(&entry_id).cloned())
    }

    async fn entries_between(
        &self,
        owner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiaryEntry>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut entries: Vec<DiaryEntry> = inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && e.recorded_at >= start && e.recorded_at < end)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }

    async fn recent_entries(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<DiaryEntry>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut entries: Vec<DiaryEntry> = inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn set_embedding(&self, entry_id: Uuid, embedding: &[f32]) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(entry) = inner.entries.get_mut(&entry_id) {
            entry.embedding = Some(embedding.to_vec());
        }
        Ok(())
    }

    async fn embedded_candidates(
        &self,
        owner_id: Uuid,
        exclude: Uuid,
    ) -> Result<Vec<(Uuid, Vec<f32>)>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id && e.id != exclude)
            .filter_map(|e| e.embedding.clone().map(|v| (e.id, v)))
            .collect())
    }

    async fn update_entry_fields(
        &self,
        entry_id: Uuid,
        fields: &EntryFields,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(entry) = inner.entries.get_mut(&entry_id) {
            entry.emotion = fields.emotion.clone();
            entry.intensity = fields.intensity;
            entry.body = fields.body.clone();
        }
        Ok(())
    }

    async fn invalidate_and_update(
        &self,
        entry_id: Uuid,
        fields: &EntryFields,
        new_embedding: &[f32],
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(entry) = inner.entries.get_mut(&entry_id) {
            entry.emotion = fields.emotion.clone();
            entry.intensity = fields.intensity;
            entry.body = fields.body.clone();
            entry.embedding = Some(new_embedding.to_vec());
        }
        inner.logs.retain(|log| log.entry_id != entry_id);
        inner.solutions.remove(&entry_id);
        Ok(())
    }

    async fn delete_entry(&self, entry_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.logs.retain(|log| log.entry_id != entry_id);
        inner.solutions.remove(&entry_id);
        inner.entries.remove(&entry_id);
        Ok(())
    }

    async fn get_solution(&self, solution_id: Uuid) -> Result<Option<Solution>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .solutions
            .values()
            .find(|s| s.id == solution_id)
            .cloned())
    }

    async fn solution_for_entry(&self, entry_id: Uuid) -> Result<Option<Solution>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.solutions.get(&entry_id).cloned())
    }

    async fn record_generation(&self, entry_id: Uuid, content: &str) -> Result<Solution, AppError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let now = Utc::now();

        let solution = match inner.solutions.get_mut(&entry_id) {
            Some(existing) => {
                existing.content = content.to_string();
                existing.eval_score = 0;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let solution = Solution {
                    id: Uuid::new_v4(),
                    entry_id,
                    content: content.to_string(),
                    eval_score: 0,
                    created_at: now,
                    updated_at: now,
                };
                inner.solutions.insert(entry_id, solution.clone());
                solution
            }
        };

        inner.logs.push(FeedbackLog {
            id: Uuid::new_v4(),
            entry_id,
            content: content.to_string(),
            eval_score: 0,
            created_at: now,
        });

        Ok(solution)
    }

    async fn apply_evaluation(
        &self,
        solution_id: Uuid,
        entry_id: Uuid,
        score: i32,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(solution) = inner.solutions.values_mut().find(|s| s.id == solution_id) {
            solution.eval_score = score;
            solution.updated_at = Utc::now();
        }
        if let Some(log) = inner
            .logs
            .iter_mut()
            .rev()
            .find(|log| log.entry_id == entry_id)
        {
            log.eval_score = score;
        }
        Ok(())
    }

    async fn feedback_for_entries(&self, entry_ids: &[Uuid]) -> Result<Vec<FeedbackLog>, AppError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut logs = Vec::new();
        for entry_id in entry_ids {
            logs.extend(
                inner
                    .logs
                    .iter()
                    .filter(|log| log.entry_id == *entry_id)
                    .cloned(),
            );
        }
        Ok(logs)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
