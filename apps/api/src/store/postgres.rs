//! PostgreSQL-backed store. All multi-row mutations run inside a single
//! transaction; embeddings round-trip through JSONB as arrays of f32.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::diary::{DiaryEntry, EntryFields};
use crate::models::solution::{FeedbackLog, Solution};
use crate::store::DiaryStore;

pub struct PgDiaryStore {
    pool: PgPool,
}

impl PgDiaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct EntryRow {
    id: Uuid,
    owner_id: Uuid,
    emotion: String,
    intensity: i32,
    body: String,
    recorded_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    embedding: Option<Json<Vec<f32>>>,
}

impl From<EntryRow> for DiaryEntry {
    fn from(row: EntryRow) -> Self {
        DiaryEntry {
            id: row.id,
            owner_id: row.owner_id,
            emotion: row.emotion,
            intensity: row.intensity,
            body: row.body,
            recorded_at: row.recorded_at,
            created_at: row.created_at,
            embedding: row.embedding.map(|j| j.0),
        }
    }
}

#[derive(FromRow)]
struct SolutionRow {
    id: Uuid,
    entry_id: Uuid,
    content: String,
    eval_score: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SolutionRow> for Solution {
    fn from(row: SolutionRow) -> Self {
        Solution {
            id: row.id,
            entry_id: row.entry_id,
            content: row.content,
            eval_score: row.eval_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LogRow {
    id: Uuid,
    entry_id: Uuid,
    content: String,
    eval_score: i32,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for FeedbackLog {
    fn from(row: LogRow) -> Self {
        FeedbackLog {
            id: row.id,
            entry_id: row.entry_id,
            content: row.content,
            eval_score: row.eval_score,
            created_at: row.created_at,
        }
    }
}

// ── Store implementation ─────────────────────────────────────────────────────

#[async_trait]
impl DiaryStore for PgDiaryStore {
    async fn create_entry(
        &self,
        owner_id: Uuid,
        fields: &EntryFields,
        recorded_at: DateTime<Utc>,
        embedding: Vec<f32>,
    ) -> Result<DiaryEntry, AppError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO diary_entries (id, owner_id, emotion, intensity, body, recorded_at, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&fields.emotion)
        .bind(fields.intensity)
        .bind(&fields.body)
        .bind(recorded_at)
        .bind(Json(embedding))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_entry(&self, entry_id: Uuid) -> Result<Option<DiaryEntry>, AppError> {
        let row = sqlx::query_as::<_, EntryRow>("SELECT * FROM diary_entries WHERE id = $1")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn entries_between(
        &self,
        owner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DiaryEntry>, AppError> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM diary_entries
            WHERE owner_id = $1 AND recorded_at >= $2 AND recorded_at < $3
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_entries(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> Result<Vec<DiaryEntry>, AppError> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM diary_entries
            WHERE owner_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_embedding(&self, entry_id: Uuid, embedding: &[f32]) -> Result<(), AppError> {
        sqlx::query("UPDATE diary_entries SET embedding = $2 WHERE id = $1")
            .bind(entry_id)
            .bind(Json(embedding.to_vec()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn embedded_candidates(
        &self,
        owner_id: Uuid,
        exclude: Uuid,
    ) -> Result<Vec<(Uuid, Vec<f32>)>, AppError> {
        let rows = sqlx::query_as::<_, (Uuid, Json<Vec<f32>>)>(
            r#"
            SELECT id, embedding FROM diary_entries
            WHERE owner_id = $1 AND id <> $2 AND embedding IS NOT NULL
            "#,
        )
        .bind(owner_id)
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id, json)| (id, json.0)).collect())
    }

    async fn update_entry_fields(
        &self,
        entry_id: Uuid,
        fields: &EntryFields,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE diary_entries SET emotion = $2, intensity = $3, body = $4 WHERE id = $1",
        )
        .bind(entry_id)
        .bind(&fields.emotion)
        .bind(fields.intensity)
        .bind(&fields.body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn invalidate_and_update(
        &self,
        entry_id: Uuid,
        fields: &EntryFields,
        new_embedding: &[f32],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE diary_entries
            SET emotion = $2, intensity = $3, body = $4, embedding = $5
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .bind(&fields.emotion)
        .bind(fields.intensity)
        .bind(&fields.body)
        .bind(Json(new_embedding.to_vec()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM feedback_logs WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM solutions WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_entry(&self, entry_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM feedback_logs WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM solutions WHERE entry_id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM diary_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_solution(&self, solution_id: Uuid) -> Result<Option<Solution>, AppError> {
        let row = sqlx::query_as::<_, SolutionRow>("SELECT * FROM solutions WHERE id = $1")
            .bind(solution_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn solution_for_entry(&self, entry_id: Uuid) -> Result<Option<Solution>, AppError> {
        let row = sqlx::query_as::<_, SolutionRow>("SELECT * FROM solutions WHERE entry_id = $1")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn record_generation(&self, entry_id: Uuid, content: &str) -> Result<Solution, AppError> {
        let mut tx = self.pool.begin().await?;

        // Upsert keyed on the 1:1 entry_id unique constraint. A regenerated
        // solution starts unscored again.
        let solution = sqlx::query_as::<_, SolutionRow>(
            r#"
            INSERT INTO solutions (id, entry_id, content, eval_score)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (entry_id) DO UPDATE
            SET content = EXCLUDED.content, eval_score = 0, updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO feedback_logs (id, entry_id, content, eval_score) VALUES ($1, $2, $3, 0)",
        )
        .bind(Uuid::new_v4())
        .bind(entry_id)
        .bind(content)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(solution.into())
    }

    async fn apply_evaluation(
        &self,
        solution_id: Uuid,
        entry_id: Uuid,
        score: i32,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE solutions SET eval_score = $2, updated_at = now() WHERE id = $1")
            .bind(solution_id)
            .bind(score)
            .execute(&mut *tx)
            .await?;

        // Most recent log row only; earlier generations keep their scores.
        sqlx::query(
            r#"
            UPDATE feedback_logs SET eval_score = $2
            WHERE id = (
                SELECT id FROM feedback_logs
                WHERE entry_id = $1
                ORDER BY created_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(entry_id)
        .bind(score)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn feedback_for_entries(&self, entry_ids: &[Uuid]) -> Result<Vec<FeedbackLog>, AppError> {
        // Rank order of entry_ids must survive; a per-id fetch keeps that
        // without a JOIN-and-reorder. The list is at most top-k long.
        let mut logs = Vec::new();
        for entry_id in entry_ids {
            let rows = sqlx::query_as::<_, LogRow>(
                "SELECT * FROM feedback_logs WHERE entry_id = $1 ORDER BY created_at ASC",
            )
            .bind(*entry_id)
            .fetch_all(&self.pool)
            .await?;
            logs.extend(rows.into_iter().map(Into::into));
        }
        Ok(logs)
    }
}
