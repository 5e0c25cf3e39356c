//! Review step endpoints. Every mutation responds with the full snapshot so
//! the caller can re-render totals and fields in one go.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{AdjustRequest, EditFieldsRequest};
use crate::services::ReviewSnapshot;
use crate::startup::AppState;

#[tracing::instrument(skip(state))]
pub async fn load_review(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<(StatusCode, Json<ReviewSnapshot>), AppError> {
    let snapshot = state.reviews.load(project_id).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<ReviewSnapshot>, AppError> {
    Ok(Json(state.reviews.snapshot(project_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn discard_review(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.reviews.discard(project_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, request))]
pub async fn adjust(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<ReviewSnapshot>, AppError> {
    request.validate()?;

    tracing::info!(
        scope = %request.scope,
        percent = %request.percent,
        "Bulk adjustment requested"
    );

    let snapshot = state
        .reviews
        .adjust(project_id, request.scope, request.percent)
        .await?;
    Ok(Json(snapshot))
}

#[tracing::instrument(skip(state, request))]
pub async fn edit_fields(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(request): Json<EditFieldsRequest>,
) -> Result<Json<ReviewSnapshot>, AppError> {
    let inputs = request
        .into_inputs()
        .map_err(|message| AppError::BadRequest(anyhow::anyhow!(message)))?;

    Ok(Json(state.reviews.edit(project_id, inputs).await?))
}

#[tracing::instrument(skip(state))]
pub async fn save(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<ReviewSnapshot>, AppError> {
    Ok(Json(state.reviews.save(project_id).await?))
}

#[tracing::instrument(skip(state))]
pub async fn reset(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<ReviewSnapshot>, AppError> {
    Ok(Json(state.reviews.reset(project_id).await?))
}
