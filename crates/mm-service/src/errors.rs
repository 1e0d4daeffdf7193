//! Matchmaking service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Matchmaking service error type.
///
/// Maps to appropriate HTTP status codes:
/// - Store, Internal: 500 Internal Server Error
/// - UpstreamAuth, UpstreamSession: 503 Service Unavailable
/// - PartyNotFound: 404 Not Found
/// - Expired: 410 Gone
#[derive(Debug, Error)]
pub enum MmError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session provider auth failed: {0}")]
    UpstreamAuth(String),

    #[error("Session creation failed: {0}")]
    UpstreamSession(String),

    #[error("Party not found: {0}")]
    PartyNotFound(String),

    #[error("Party expired: {0}")]
    Expired(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MmError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            MmError::Store(_) | MmError::Internal(_) => 500,
            MmError::UpstreamAuth(_) | MmError::UpstreamSession(_) => 503,
            MmError::PartyNotFound(_) => 404,
            MmError::Expired(_) => 410,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for MmError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            MmError::Store(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "mm.store", error = %err, "Store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "An internal storage error occurred".to_string(),
                )
            }
            MmError::UpstreamAuth(reason) => {
                tracing::warn!(target: "mm.zoom", reason = %reason, "Provider authentication failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Matching is temporarily unavailable. Please try again shortly.".to_string(),
                )
            }
            MmError::UpstreamSession(reason) => {
                tracing::warn!(target: "mm.zoom", reason = %reason, "Session creation failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Matching is temporarily unavailable. Please try again shortly.".to_string(),
                )
            }
            MmError::PartyNotFound(_) => (
                StatusCode::NOT_FOUND,
                "PARTY_NOT_FOUND",
                "Unknown or already-resolved party".to_string(),
            ),
            MmError::Expired(_) => (
                StatusCode::GONE,
                "MATCH_EXPIRED",
                "The wait timed out before a partner arrived. Please try again.".to_string(),
            ),
            MmError::Internal(err) => {
                tracing::error!(target: "mm.service", error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
