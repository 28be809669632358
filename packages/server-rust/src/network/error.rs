//! API error type and its JSON response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helpdesk_core::StoreError;
use serde::{Deserialize, Serialize};

/// Error body: `{ "error": { "code": "...", "message": "..." } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code.
    pub code: String,
    /// Human readable message, shown to users as-is.
    pub message: String,
}

pub const NOT_FOUND: &str = "NOT_FOUND";
pub const ROW_NOT_FOUND: &str = "ROW_NOT_FOUND";
pub const INVALID_IDENTIFIER: &str = "INVALID_IDENTIFIER";
pub const REJECTED: &str = "REJECTED";
pub const UNAVAILABLE: &str = "UNAVAILABLE";
pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";

/// Everything a table API handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("authentication required")]
    Unauthenticated,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, NOT_FOUND),
            Self::Store(StoreError::RowNotFound { .. }) => (StatusCode::NOT_FOUND, ROW_NOT_FOUND),
            Self::Store(StoreError::InvalidIdentifier(_)) => {
                (StatusCode::BAD_REQUEST, INVALID_IDENTIFIER)
            }
            Self::Store(StoreError::Rejected { .. }) => (StatusCode::CONFLICT, REJECTED),
            Self::Store(StoreError::Unavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE)
            }
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, UNAUTHENTICATED),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::warn!(code, error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
