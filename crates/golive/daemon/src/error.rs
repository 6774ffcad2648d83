//! Error types for golived

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use golive_control::ControlPlaneError;
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

    /// Control plane error
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed path or body
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Control plane refusal or failure
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
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
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::ControlPlane(err) => {
                let status = match err {
                    ControlPlaneError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
                    ControlPlaneError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    ControlPlaneError::Conflict { .. } => StatusCode::CONFLICT,
                    ControlPlaneError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    ControlPlaneError::NotFound(_) => StatusCode::NOT_FOUND,
                    ControlPlaneError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
        };

        let details = match &self {
            ApiError::ControlPlane(err) if !err.reasons().is_empty() => {
                serde_json::to_value(err.reasons()).ok()
            }
            _ => None,
        };

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "Request failed");
        }

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

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::BadRequest("test".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ControlPlaneError::Disabled).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(ControlPlaneError::validation("cycle", "a -> b -> a"))
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(ControlPlaneError::NotFound("plan".into()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
