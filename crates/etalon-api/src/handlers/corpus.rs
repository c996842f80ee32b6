//! Reference corpus endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use etalon_core::ReferenceSample;
use etalon_engine::{export_corpus, import_corpus};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CorpusQuery {
    pub theme: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    query: Result<Query<CorpusQuery>, QueryRejection>,
) -> Result<Json<Vec<ReferenceSample>>, ApiError> {
    let Query(query) = query?;
    let samples = export_corpus(state.store.as_ref(), query.theme.as_deref()).await?;
    Ok(Json(samples))
}

pub async fn import(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ReferenceSample>>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(samples) = payload?;
    let changed = import_corpus(state.store.as_ref(), &samples).await?;
    Ok(Json(serde_json::json!({
        "received": samples.len(),
        "changed": changed,
    })))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.store.count().await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn clear(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.clear().await?;
    info!(
        subsystem = "api",
        component = "corpus",
        op = "clear",
        "Reference corpus cleared"
    );
    Ok(StatusCode::NO_CONTENT)
}
