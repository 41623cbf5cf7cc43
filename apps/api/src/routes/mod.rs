pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::diary::handlers as diary;
use crate::solution::handlers as solution;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Diary API
        .route("/api/v1/diaries", post(diary::handle_create))
        .route("/api/v1/diaries/monthly", get(diary::handle_monthly))
        .route("/api/v1/diaries/daily", get(diary::handle_daily))
        .route("/api/v1/diaries/recent", get(diary::handle_recent))
        .route("/api/v1/diaries/:id", put(diary::handle_update))
        .route("/api/v1/diaries/:id", delete(diary::handle_delete))
        // Solution API
        .route("/api/v1/solutions/generate", post(solution::handle_generate))
        .route(
            "/api/v1/solutions/:id/feedback",
            post(solution::handle_feedback),
        )
        .with_state(state)
}
