//! Error types for memebox-server HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or empty search term (400)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Catalog cannot be read or written (500)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<memebox_common::Error> for ApiError {
    fn from(err: memebox_common::Error) -> Self {
        use memebox_common::Error;
        match err {
            Error::InvalidQuery(msg) => ApiError::InvalidQuery(msg),
            Error::StorageUnavailable(msg) => ApiError::StorageUnavailable(msg),
            Error::Io(e) => ApiError::StorageUnavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::StorageUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match self {
            ApiError::InvalidQuery(msg) => ("BAD_REQUEST", msg),
            ApiError::StorageUnavailable(msg) => ("STORAGE_UNAVAILABLE", msg),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
