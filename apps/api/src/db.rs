use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the schema if it does not exist yet. Idempotent; runs at startup.
///
/// Embeddings live in JSONB as plain f32 arrays. The encoding must
/// round-trip exactly for cosine comparison, and serde_json's shortest
/// float representation does.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS diary_entries (
            id UUID PRIMARY KEY,
            owner_id UUID NOT NULL,
            emotion TEXT NOT NULL,
            intensity INT NOT NULL,
            body TEXT NOT NULL,
            recorded_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            embedding JSONB
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS solutions (
            id UUID PRIMARY KEY,
            entry_id UUID NOT NULL UNIQUE REFERENCES diary_entries(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            eval_score INT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback_logs (
            id UUID PRIMARY KEY,
            entry_id UUID NOT NULL REFERENCES diary_entries(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            eval_score INT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_diary_entries_owner_recorded
        ON diary_entries (owner_id, recorded_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
