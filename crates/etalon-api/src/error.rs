//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Error returned by HTTP handlers, rendered as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Internal(etalon_core::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

impl From<etalon_core::Error> for ApiError {
    fn from(err: etalon_core::Error) -> Self {
        use etalon_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::EmptyText(_)
            | Error::InvalidLabel(_)
            | Error::InvalidInput(_)
            | Error::Serialization(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(subsystem = "api", error = %self, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_input_errors_map_to_bad_request() {
        let cases = [
            etalon_core::Error::EmptyText(Uuid::nil()),
            etalon_core::Error::InvalidLabel("maybe".into()),
            etalon_core::Error::InvalidInput("duplicate text id".into()),
        ];
        for err in cases {
            assert_eq!(ApiError::from(err).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ApiError::from(etalon_core::Error::NotFound("analysis x".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "analysis x");
    }

    #[test]
    fn test_store_errors_map_to_500() {
        let err = ApiError::from(etalon_core::Error::Queue("closed".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Queue error: closed");
    }
}
