//! Match store: the shared state behind the matchmaking engine.
//!
//! Two collections: the FIFO queue of waiting parties and the outcome map
//! keyed by party id. The `MatchStore` trait is the capability seam between
//! the engine and storage; the in-memory implementation serves a single
//! instance, the redis implementation lets several instances share one
//! queue.
//!
//! Operations that must not interleave across instances (`pop_or_enqueue`,
//! `take_outcome`, `remove_waiter`, `drain_stale`) are atomic in every
//! implementation.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{PartyOutcome, WaitingParty};

pub mod lua_scripts;
mod memory;
mod redis;

pub use memory::MemoryMatchStore;
pub use redis::RedisMatchStore;

/// Store operation failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store serialization error: {0}")]
    Serialization(String),
}

/// Result of the atomic arrival operation.
///
/// `popped` is the earliest fresh waiter when one existed (the arrival was
/// not enqueued); `expired` holds any stale waiters the pop skipped over,
/// which the engine turns into `Expired` outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopOrEnqueue {
    pub popped: Option<WaitingParty>,
    pub expired: Vec<WaitingParty>,
}

/// Capability interface over the queue and the outcome map.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Atomically pop the earliest fresh waiter, or enqueue `party` at the
    /// tail if no fresh waiter exists. Stale waiters encountered at the
    /// head are removed and returned in `expired`; they never match.
    async fn pop_or_enqueue(
        &self,
        party: &WaitingParty,
        stale_before_ms: i64,
    ) -> Result<PopOrEnqueue, StoreError>;

    /// Restore a previously popped waiter to the head of the queue,
    /// preserving its original position relative to later arrivals.
    async fn requeue_front(&self, party: &WaitingParty) -> Result<(), StoreError>;

    /// Look up a waiter by party id without removing it.
    async fn get_waiter(&self, party_id: &str) -> Result<Option<WaitingParty>, StoreError>;

    /// Remove a waiter by party id. Returns whether it was present.
    async fn remove_waiter(&self, party_id: &str) -> Result<bool, StoreError>;

    /// Current number of queued waiters.
    async fn queue_len(&self) -> Result<usize, StoreError>;

    /// Write (or overwrite) the outcome record for a party with a TTL.
    async fn put_outcome(
        &self,
        party_id: &str,
        outcome: &PartyOutcome,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Read the outcome record for a party, if any.
    async fn get_outcome(&self, party_id: &str) -> Result<Option<PartyOutcome>, StoreError>;

    /// Atomically read and delete the outcome record for a party. Under
    /// concurrent polls exactly one caller observes `Some`.
    async fn take_outcome(&self, party_id: &str) -> Result<Option<PartyOutcome>, StoreError>;

    /// Delete the outcome record for a party. Returns whether it existed.
    async fn delete_outcome(&self, party_id: &str) -> Result<bool, StoreError>;

    /// Atomically remove every stale waiter from the queue and return them
    /// (sweeper support).
    async fn drain_stale(&self, stale_before_ms: i64) -> Result<Vec<WaitingParty>, StoreError>;
}
