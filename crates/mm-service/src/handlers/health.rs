//! Root status and health check handlers.
//!
//! - `/`: Landing response pointing visitors at the join endpoint
//! - `/health`: Store connectivity check plus queue depth

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use crate::models::{HealthResponse, RootResponse};
use crate::routes::AppState;

/// Handler for GET /
///
/// A small self-describing landing response so a visitor (or a probe)
/// hitting the bare service sees where to go next.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: "mm-service",
        status: "ok",
        message: "Open /join to be matched with a partner.",
    })
}

/// Handler for GET /health
///
/// Reports store connectivity and the current queue depth. Always answers
/// 200 with a body; probes distinguish healthy from unhealthy by the
/// `status` field, and the actual store error is logged server-side.
#[tracing::instrument(skip_all, name = "mm.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.matchmaker.queue_depth().await {
        Ok(depth) => Json(HealthResponse {
            status: "healthy",
            store: "healthy",
            queued_waiters: Some(depth),
        }),
        Err(e) => {
            tracing::warn!(
                target: "mm.handlers.health",
                error = %e,
                "Health check failed: store unreachable"
            );
            Json(HealthResponse {
                status: "unhealthy",
                store: "unhealthy",
                queued_waiters: None,
            })
        }
    }
}
