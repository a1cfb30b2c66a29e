//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kennel_engine::ErrorKind;
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Store(#[from] kennel_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Error response body: `{"err": {"kind": ..., "message": ...}}`.
#[derive(Serialize)]
struct ErrorResponse {
    err: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: ErrorKind,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Store(e) => {
                tracing::error!(kind = ?e.kind(), "Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.kind(), e.to_string())
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, ErrorKind::Validation, msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            err: ErrorDetail { kind, message },
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
