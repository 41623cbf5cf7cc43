//! Axum route handlers for the Diary API.
//!
//! Caller identity arrives as an explicit `user_id`; authentication and
//! session issuance live outside this service.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diary::service;
use crate::diary::service::{DiaryEntryView, NewDiaryEntry};
use crate::errors::AppError;
use crate::models::diary::EntryFields;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDiaryRequest {
    pub user_id: Uuid,
    pub emotion: String,
    pub intensity: i32,
    pub body: String,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateDiaryResponse {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDiaryRequest {
    pub user_id: Uuid,
    pub emotion: String,
    pub intensity: i32,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub user_id: Uuid,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub user_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn validate_entry_text(emotion: &str, body: &str) -> Result<(), AppError> {
    if emotion.trim().is_empty() {
        return Err(AppError::Validation("emotion cannot be empty".to_string()));
    }
    if body.trim().is_empty() {
        return Err(AppError::Validation("body cannot be empty".to_string()));
    }
    Ok(())
}

/// POST /api/v1/diaries
pub async fn handle_create(
    State(state): State<AppState>,
    Json(request): Json<CreateDiaryRequest>,
) -> Result<Json<CreateDiaryResponse>, AppError> {
    validate_entry_text(&request.emotion, &request.body)?;

    let entry = service::save_diary(
        state.store.as_ref(),
        state.embedder.as_ref(),
        request.user_id,
        NewDiaryEntry {
            emotion: request.emotion,
            intensity: request.intensity,
            body: request.body,
            recorded_at: request.recorded_at,
        },
    )
    .await?;

    Ok(Json(CreateDiaryResponse { id: entry.id }))
}

/// PUT /api/v1/diaries/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<UpdateDiaryRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    validate_entry_text(&request.emotion, &request.body)?;

    service::update_diary(
        state.store.as_ref(),
        state.embedder.as_ref(),
        state.locks.as_ref(),
        request.user_id,
        entry_id,
        EntryFields {
            emotion: request.emotion,
            intensity: request.intensity,
            body: request.body,
        },
    )
    .await?;

    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/v1/diaries/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    service::delete_diary(
        state.store.as_ref(),
        state.locks.as_ref(),
        query.user_id,
        entry_id,
    )
    .await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/v1/diaries/monthly?user_id=&year=&month=
pub async fn handle_monthly(
    State(state): State<AppState>,
    Query(query): Query<MonthlyQuery>,
) -> Result<Json<Vec<DiaryEntryView>>, AppError> {
    let views = service::monthly_records(
        state.store.as_ref(),
        query.user_id,
        query.year,
        query.month,
    )
    .await?;
    Ok(Json(views))
}

/// GET /api/v1/diaries/daily?user_id=&date=YYYY-MM-DD
pub async fn handle_daily(
    State(state): State<AppState>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<Vec<DiaryEntryView>>, AppError> {
    let views = service::daily_records(state.store.as_ref(), query.user_id, query.date).await?;
    Ok(Json(views))
}

/// GET /api/v1/diaries/recent?user_id=
pub async fn handle_recent(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<DiaryEntryView>>, AppError> {
    let views = service::recent_records(state.store.as_ref(), query.user_id).await?;
    Ok(Json(views))
}
