//! Batch analysis endpoints.
//!
//! `POST /api/v1/analyze` runs a batch synchronously. `POST /api/v1/analyses`
//! places it on the durable queue for the background worker, and
//! `GET /api/v1/analyses/:id` reports its status and result.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use etalon_core::{AnalysisMessage, BatchOutcome, InputBatch};

use crate::error::ApiError;
use crate::AppState;

fn non_empty(batch: InputBatch) -> Result<InputBatch, ApiError> {
    if batch.items.is_empty() {
        return Err(ApiError::BadRequest("batch contains no items".to_string()));
    }
    Ok(batch)
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<InputBatch>, JsonRejection>,
) -> Result<Json<BatchOutcome>, ApiError> {
    let Json(batch) = payload?;
    let batch = non_empty(batch)?;
    let outcome = state.pipeline.run(&batch).await?;
    Ok(Json(outcome))
}

pub async fn submit_analysis(
    State(state): State<AppState>,
    payload: Result<Json<InputBatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(batch) = payload?;
    let batch = non_empty(batch)?;
    let id = state.queue.enqueue(&batch).await?;
    info!(
        subsystem = "api",
        component = "analysis",
        op = "enqueue",
        message_id = %id,
        item_count = batch.items.len(),
        "Batch queued"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "id": id,
            "status": "pending",
        })),
    ))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisMessage>, ApiError> {
    state
        .queue
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("analysis {} not found", id)))
}
