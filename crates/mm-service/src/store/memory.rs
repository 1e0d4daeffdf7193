//! In-memory match store for single-instance deployments.
//!
//! Selected when no `REDIS_URL` is configured. Holds the queue and the
//! outcome map behind one async mutex; atomicity of the compound
//! operations falls out of the single lock. Outcome TTLs are enforced
//! lazily on read.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::models::{PartyOutcome, WaitingParty};
use crate::store::{MatchStore, PopOrEnqueue, StoreError};

struct StoredOutcome {
    outcome: PartyOutcome,
    expires_at_ms: i64,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<WaitingParty>,
    outcomes: HashMap<String, StoredOutcome>,
}

/// Single-process `MatchStore` backed by a `VecDeque` and a `HashMap`.
#[derive(Default)]
pub struct MemoryMatchStore {
    inner: Mutex<Inner>,
}

impl MemoryMatchStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn pop_or_enqueue(
        &self,
        party: &WaitingParty,
        stale_before_ms: i64,
    ) -> Result<PopOrEnqueue, StoreError> {
        let mut inner = self.inner.lock().await;

        let mut expired = Vec::new();
        let mut popped = None;

        while let Some(head) = inner.queue.pop_front() {
            if head.is_stale(stale_before_ms) {
                expired.push(head);
            } else {
                popped = Some(head);
                break;
            }
        }

        if popped.is_none() {
            inner.queue.push_back(party.clone());
        }

        Ok(PopOrEnqueue { popped, expired })
    }

    async fn requeue_front(&self, party: &WaitingParty) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.queue.push_front(party.clone());
        Ok(())
    }

    async fn get_waiter(&self, party_id: &str) -> Result<Option<WaitingParty>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.iter().find(|w| w.id == party_id).cloned())
    }

    async fn remove_waiter(&self, party_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.queue.iter().position(|w| w.id == party_id) {
            Some(idx) => {
                let _ = inner.queue.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn queue_len(&self) -> Result<usize, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.len())
    }

    async fn put_outcome(
        &self,
        party_id: &str,
        outcome: &PartyOutcome,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = now_ms().saturating_add(ttl_ms);

        let mut inner = self.inner.lock().await;
        inner.outcomes.insert(
            party_id.to_string(),
            StoredOutcome {
                outcome: outcome.clone(),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn get_outcome(&self, party_id: &str) -> Result<Option<PartyOutcome>, StoreError> {
        let now = now_ms();
        let mut inner = self.inner.lock().await;

        // Lazily reap an expired record before reading
        let is_expired = inner
            .outcomes
            .get(party_id)
            .is_some_and(|stored| stored.expires_at_ms <= now);
        if is_expired {
            inner.outcomes.remove(party_id);
        }

        Ok(inner
            .outcomes
            .get(party_id)
            .map(|stored| stored.outcome.clone()))
    }

    async fn take_outcome(&self, party_id: &str) -> Result<Option<PartyOutcome>, StoreError> {
        let now = now_ms();
        let mut inner = self.inner.lock().await;

        match inner.outcomes.remove(party_id) {
            Some(stored) if stored.expires_at_ms > now => Ok(Some(stored.outcome)),
            _ => Ok(None),
        }
    }

    async fn delete_outcome(&self, party_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.outcomes.remove(party_id).is_some())
    }

    async fn drain_stale(&self, stale_before_ms: i64) -> Result<Vec<WaitingParty>, StoreError> {
        let mut inner = self.inner.lock().await;

        let mut drained = Vec::new();
        inner.queue.retain(|w| {
            if w.is_stale(stale_before_ms) {
                drained.push(w.clone());
                false
            } else {
                true
            }
        });

        Ok(drained)
    }
}
