//! HTTP handlers for etalon-api.

pub mod analysis;
pub mod corpus;

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::AppState;

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let corpus_size = state.store.count().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "corpus_size": corpus_size,
    })))
}
