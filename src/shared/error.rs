//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad or missing credential. The only error that is fatal to a
    /// WebSocket connection.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Caller is not allowed to perform the operation (e.g. not an active
    /// group member). Operation-level; the connection survives.
    #[error("Forbidden: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code reported in WebSocket `error` frames.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Authentication(_) => 4001,
            AppError::Authorization(_) => 4003,
            AppError::Validation(_) => 4000,
            AppError::NotFound(_) => 4004,
            AppError::Database(_) | AppError::Internal(_) => 4500,
        }
    }

    /// Client-facing message. Store failures are logged server-side and
    /// redacted here.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".into()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".into()
            }
            other => other.to_string(),
        }
    }

    /// Whether this failure must tear down the connection it occurred on.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, AppError::Authentication(_))
    }
}

/// Error response body for the HTTP surface
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            code: self.code(),
            message: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authentication_is_connection_fatal() {
        assert!(AppError::Authentication("bad token".into()).is_connection_fatal());
        assert!(!AppError::Authorization("not a member".into()).is_connection_fatal());
        assert!(!AppError::Validation("empty content".into()).is_connection_fatal());
        assert!(!AppError::NotFound("conversation".into()).is_connection_fatal());
        assert!(!AppError::Internal("boom".into()).is_connection_fatal());
    }

    #[test]
    fn store_failures_are_redacted() {
        let err = AppError::Internal("pool exhausted".into());
        assert_eq!(err.client_message(), "Internal server error");
    }
}
