//! Matchmaking handlers: arrival and polling.
//!
//! `GET /join` is the single entry point for a visitor who wants a call.
//! The response is either a temporary redirect straight into a freshly
//! created session (a partner was already waiting) or a JSON body telling
//! the visitor to poll `GET /join/{party_id}` until a partner arrives.
//!
//! Redirects use 307 so user agents re-issue the original method against
//! the session URL.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use crate::errors::MmError;
use crate::models::{MatchResult, WaitingResponse};
use crate::routes::AppState;

/// Handler for GET /join
///
/// Arrival endpoint. Pairs the visitor with the earliest fresh waiter when
/// one exists, otherwise enqueues the visitor.
///
/// # Responses
///
/// - `307 Temporary Redirect` to the guest session URL when paired
/// - `200 OK` with a waiting body when enqueued
/// - `503` when the session provider is unavailable (the waiter is restored)
#[tracing::instrument(skip_all, name = "mm.handlers.join")]
pub async fn join(State(state): State<Arc<AppState>>) -> Result<Response, MmError> {
    match state.matchmaker.arrive().await? {
        MatchResult::Paired { redirect_url } => {
            Ok(Redirect::temporary(&redirect_url).into_response())
        }
        MatchResult::Waiting { party_id } => {
            debug!(target: "mm.handlers.join", party_id = %party_id, "Visitor enqueued");
            Ok(Json(WaitingResponse::new(&party_id)).into_response())
        }
    }
}

/// Handler for GET /join/:party_id
///
/// Poll endpoint for an enqueued visitor.
///
/// # Responses
///
/// - `307 Temporary Redirect` to the host session URL once paired
///   (delivered at most once)
/// - `200 OK` with a waiting body while still queued or pairing in flight
/// - `410 Gone` once after the wait timed out
/// - `404 Not Found` for unknown or already-resolved parties
#[tracing::instrument(skip_all, name = "mm.handlers.poll", fields(party_id = %party_id))]
pub async fn poll_party(
    State(state): State<Arc<AppState>>,
    Path(party_id): Path<String>,
) -> Result<Response, MmError> {
    match state.matchmaker.resolve_waiting(&party_id).await? {
        MatchResult::Paired { redirect_url } => {
            Ok(Redirect::temporary(&redirect_url).into_response())
        }
        MatchResult::Waiting { party_id } => {
            Ok(Json(WaitingResponse::new(&party_id)).into_response())
        }
    }
}
