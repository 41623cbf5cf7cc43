//! Axum route handlers for the Solution API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::solution::orchestrator::{evaluate_solution, generate_solution, SolutionView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateSolutionRequest {
    pub user_id: Uuid,
    pub record_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub user_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
}

/// POST /api/v1/solutions/generate
///
/// Runs the full RAG pipeline for one diary entry and returns the persisted
/// solution. Safe to call repeatedly: regeneration overwrites the solution
/// and appends to the feedback log.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateSolutionRequest>,
) -> Result<Json<SolutionView>, AppError> {
    let view = generate_solution(
        state.store.as_ref(),
        state.embedder.as_ref(),
        state.completer.as_ref(),
        &state.locks,
        request.user_id,
        request.record_id,
    )
    .await?;

    Ok(Json(view))
}

/// POST /api/v1/solutions/:id/feedback
///
/// Attaches a 1–5 score to a solution and to the log row of the generation
/// that produced it.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Path(solution_id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    evaluate_solution(
        state.store.as_ref(),
        &state.config,
        request.user_id,
        solution_id,
        request.score,
    )
    .await?;

    Ok(Json(FeedbackResponse { success: true }))
}
