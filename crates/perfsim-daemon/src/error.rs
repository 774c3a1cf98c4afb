//! Error types for perfsimd

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use perfsim_engine::{EngineError, SyntheticFailure};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Probe could not be started
    #[error("Probe error: {0}")]
    Probe(#[from] perfsim_probe::ProbeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Injected failure from degrading load work
    #[error("{0}")]
    Synthetic(#[from] SyntheticFailure),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::Validation(msg),
            EngineError::NotFound(id) => ApiError::NotFound(format!("simulation {}", id)),
            EngineError::Synthetic(failure) => ApiError::Synthetic(failure),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Synthetic(failure) => (StatusCode::INTERNAL_SERVER_ERROR, failure.code()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let details = match &self {
            ApiError::Synthetic(_) => Some(serde_json::json!({ "synthetic": true })),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use perfsim_types::SimulationId;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation("test".to_string()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Synthetic(SyntheticFailure::DeadlockDetected)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_engine_errors_map_to_api_errors() {
        let err: ApiError = EngineError::Validation("bad".into()).into();
        assert!(matches!(err, ApiError::Validation(_)));

        let err: ApiError = EngineError::NotFound(SimulationId::generate()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = EngineError::Synthetic(SyntheticFailure::PoolExhausted).into();
        assert!(matches!(err, ApiError::Synthetic(SyntheticFailure::PoolExhausted)));

        let err: ApiError = EngineError::Internal("boom".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
