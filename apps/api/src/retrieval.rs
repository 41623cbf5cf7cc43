//! Similarity ranking — the retrieval half of solution generation.
//!
//! Retrieval is an in-memory linear scan over a single user's embedded
//! entries. At that scale (hundreds of entries, not a global corpus) no
//! index structure is warranted; cosine over the candidate list is O(n).

use uuid::Uuid;

/// Cosine similarity between two vectors, accumulated in f64.
///
/// Returns 0.0 (never NaN, never an error) when either vector has zero
/// norm or the dimensions disagree. A dimension mismatch means the stored
/// embedding came from a different model and cannot be compared.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Ranks `candidates` by cosine similarity to `query`, descending, and
/// returns the ids of the top `k`.
///
/// Ties break by candidate id ascending so retrieval is reproducible;
/// the ordering never depends on container iteration order.
pub fn rank_top_k(query: &[f32], candidates: &[(Uuid, Vec<f32>)], k: usize) -> Vec<Uuid> {
    let mut scored: Vec<(Uuid, f64)> = candidates
        .iter()
        .map(|(id, vector)| (*id, cosine_similarity(query, vector)))
        .collect();

    scored.sort_by(|(id_a, score_a), (id_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| id_a.cmp(id_b))
    });

    scored.into_iter().take(k).map(|(id, _)| id).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
