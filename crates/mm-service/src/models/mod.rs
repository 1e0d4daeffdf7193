//! Data models for the matchmaking service.
//!
//! Domain types (`WaitingParty`, `SessionDescriptor`, `PartyOutcome`,
//! `MatchResult`) plus the JSON response bodies served by the HTTP layer.
//! Domain types that live in the shared store serialize as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message shown to a visitor who is queued and waiting for a partner.
pub const WAITING_MESSAGE: &str = "Waiting for a match... Please stay on this page.";

/// A visitor waiting in the matchmaking queue.
///
/// Stored as JSON in the shared store. The enqueue time is epoch
/// milliseconds rather than an RFC 3339 string so the staleness comparison
/// is the same arithmetic in-process and inside redis Lua scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingParty {
    /// Opaque identifier generated at arrival.
    pub id: String,

    /// Arrival time in epoch milliseconds.
    pub enqueued_at_ms: i64,
}

impl WaitingParty {
    /// Create a waiting party with a fresh identifier, enqueued now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            enqueued_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Whether this waiter arrived before the staleness cutoff.
    #[must_use]
    pub fn is_stale(&self, stale_before_ms: i64) -> bool {
        self.enqueued_at_ms < stale_before_ms
    }
}

impl Default for WaitingParty {
    fn default() -> Self {
        Self::new()
    }
}

/// The session provider's representation of a created call.
///
/// Immutable after creation. The host and guest URLs are distinct: the
/// host URL starts the call, the guest URL joins it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Provider-assigned session identifier.
    pub id: String,

    /// Redirect URL for the first-arrived party (the host).
    pub host_url: String,

    /// Redirect URL for the second-arrived party (the guest).
    pub guest_url: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// Terminal-or-in-flight fate of a party, keyed by party id in the store.
///
/// State machine per party: `Waiting -> Paired -> (consumed)` or
/// `Waiting -> Expired -> (consumed)`. `Pending` is the reservation written
/// while session creation is in flight; it resolves to `Paired` or is
/// deleted when the waiter is restored to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PartyOutcome {
    /// Pairing reserved; session creation has not finished yet.
    Pending,

    /// Paired as host; the descriptor holds the redirect URLs.
    Paired { session: SessionDescriptor },

    /// Timed out before a partner arrived.
    Expired,
}

/// Result of an arrival or a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// A pairing completed; the caller should be redirected into the call.
    Paired { redirect_url: String },

    /// The party is (still) waiting; resolve later via the poll endpoint.
    Waiting { party_id: String },
}

/// JSON body returned to a waiting visitor.
#[derive(Debug, Serialize, Deserialize)]
pub struct WaitingResponse {
    /// Always `"waiting"`.
    pub status: String,

    /// Identifier to poll with.
    pub party_id: String,

    /// Poll endpoint for this party.
    pub poll_url: String,

    /// Human-readable hint for the visitor.
    pub message: String,
}

impl WaitingResponse {
    /// Build the waiting body for a party id.
    #[must_use]
    pub fn new(party_id: &str) -> Self {
        Self {
            status: "waiting".to_string(),
            party_id: party_id.to_string(),
            poll_url: format!("/join/{party_id}"),
            message: WAITING_MESSAGE.to_string(),
        }
    }
}

/// JSON body for the root status endpoint.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub message: &'static str,
}

/// JSON body for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` or `"unhealthy"`.
    pub status: &'static str,

    /// Store connectivity: `"healthy"` or `"unhealthy"`.
    pub store: &'static str,

    /// Current queue depth (omitted when the store is unreachable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_waiters: Option<usize>,
}
