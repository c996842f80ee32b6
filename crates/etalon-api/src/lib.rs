//! # etalon-api
//!
//! HTTP surface for the etalon similarity engine: synchronous and queued
//! batch analysis, plus reference corpus export, import and reset.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use etalon_core::{defaults, AnalysisQueue, ReferenceStore};
use etalon_engine::Pipeline;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn ReferenceStore>,
    pub queue: Arc<dyn AnalysisQueue>,
}

impl AppState {
    /// The store is taken from the pipeline so both always see one corpus.
    pub fn new(pipeline: Arc<Pipeline>, queue: Arc<dyn AnalysisQueue>) -> Self {
        Self {
            store: Arc::clone(pipeline.store()),
            pipeline,
            queue,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    /// Empty means any origin.
    pub allowed_origins: Vec<HeaderValue>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            max_body_bytes: defaults::MAX_BODY_BYTES,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HOST` | `0.0.0.0` | Bind address |
    /// | `PORT` | `3000` | Bind port |
    /// | `MAX_BODY_BYTES` | `16777216` | Request body limit |
    /// | `ALLOWED_ORIGINS` | (any) | Comma-separated CORS origins |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| defaults::SERVER_HOST.to_string());
        let port = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::SERVER_PORT);
        let max_body_bytes = lookup("MAX_BODY_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::MAX_BODY_BYTES);
        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|v| parse_allowed_origins(&v))
            .unwrap_or_default();

        Self {
            host,
            port,
            max_body_bytes,
            allowed_origins,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_allowed_origins(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(subsystem = "api", "Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

/// Build the application router.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let origins = if config.allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(config.allowed_origins.clone())
    };
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/analyze", post(handlers::analysis::analyze))
        .route("/api/v1/analyses", post(handlers::analysis::submit_analysis))
        .route("/api/v1/analyses/:id", get(handlers::analysis::get_analysis))
        .route(
            "/api/v1/corpus",
            get(handlers::corpus::export)
                .post(handlers::corpus::import)
                .delete(handlers::corpus::clear),
        )
        .route("/api/v1/corpus/stats", get(handlers::corpus::stats))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}
