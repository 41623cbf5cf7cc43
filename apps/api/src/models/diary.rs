use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A diary entry. `owner_id` and `recorded_at` are immutable after creation;
/// editing an entry never changes the recorded moment.
///
/// `embedding` holds the vector computed from `"Emotion: {emotion},
/// Content: {body}"`. It is present once a save-time or generation-time
/// embedding pass has run, and must always match the current body; the
/// store-level invalidation path replaces it atomically on body edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Open emotion tag, e.g. "joy", "sadness", "anger", "anxiety", "calm".
    pub emotion: String,
    /// App-defined intensity scale; observed range 0–100.
    pub intensity: i32,
    pub body: String,
    /// The moment the user chose for the entry, not when the row was written.
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DiaryEntry {
    /// The text that gets embedded for this entry. Emotion and body are
    /// combined so the vector carries both the feeling and its context.
    pub fn embedding_text(emotion: &str, body: &str) -> String {
        format!("Emotion: {emotion}, Content: {body}")
    }
}

/// Fields a diary update may change. Owner and recorded timestamp are not
/// editable by design.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryFields {
    pub emotion: String,
    pub intensity: i32,
    pub body: String,
}
