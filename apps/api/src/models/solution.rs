use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current AI-generated suggestion for a diary entry. Exactly one per
/// entry; regeneration overwrites `content` in place and resets the score,
/// since a score only ever refers to the content it was given for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub content: String,
    /// 0 = unscored, 1–5 = user-assigned.
    pub eval_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of one generation: the content produced and the score
/// the user later attached (0 until scored). This is the training signal
/// fed back into future prompts: "this advice got this score in this
/// context". Rows are only ever deleted when the source entry's body
/// changes or the entry itself is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackLog {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub content: String,
    pub eval_score: i32,
    pub created_at: DateTime<Utc>,
}
