//! Matchmaking engine.
//!
//! Pairs anonymous arrivals two at a time. An arrival either pops the
//! earliest fresh waiter from the queue and provisions a call session for
//! the pair, or becomes a waiter itself. The waiter who was popped (the
//! host) learns its fate by polling; terminal outcomes are delivered at
//! most once.
//!
//! # Concurrency
//!
//! The match/enqueue critical section runs under the `room` mutex, so one
//! arrival at a time decides pop-vs-enqueue on this instance (the store's
//! atomic `pop_or_enqueue` extends the guarantee across instances). The
//! provider round-trip is kept outside the lock: before releasing it, the
//! engine writes a `Pending` reservation for the popped host, which keeps
//! the host's polls answering `Waiting` while the session is created and
//! marks the pairing as claimed.
//!
//! # Failure handling
//!
//! If session creation fails, or the pairing record cannot be written
//! afterwards, the host is restored to the *front* of the queue and its
//! reservation is cleared; the arrival that triggered the pairing gets
//! the error. A popped waiter is never silently lost.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::MmError;
use crate::models::{MatchResult, PartyOutcome, WaitingParty};
use crate::observability::metrics;
use crate::services::SessionProvider;
use crate::store::MatchStore;

/// The pairing engine. One per service instance.
pub struct Matchmaker {
    store: Arc<dyn MatchStore>,
    provider: Arc<dyn SessionProvider>,
    /// Serializes the match/enqueue critical section on this instance.
    room: Mutex<()>,
    waiter_ttl: Duration,
    result_ttl: Duration,
}

impl Matchmaker {
    pub fn new(
        store: Arc<dyn MatchStore>,
        provider: Arc<dyn SessionProvider>,
        waiter_ttl: Duration,
        result_ttl: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            room: Mutex::new(()),
            waiter_ttl,
            result_ttl,
        }
    }

    /// Epoch-millisecond cutoff: waiters enqueued before this are stale.
    fn stale_cutoff_ms(&self) -> i64 {
        let ttl_ms = i64::try_from(self.waiter_ttl.as_millis()).unwrap_or(i64::MAX);
        Utc::now().timestamp_millis().saturating_sub(ttl_ms)
    }

    /// Handle a new arrival.
    ///
    /// Returns `Paired` with the guest redirect when a partner was found
    /// and the session was created, or `Waiting` with the fresh party id
    /// when the arrival was enqueued.
    #[instrument(skip_all, name = "mm.matchmaker.arrive")]
    pub async fn arrive(&self) -> Result<MatchResult, MmError> {
        let party = WaitingParty::new();
        let cutoff = self.stale_cutoff_ms();

        let host = {
            let _room = self.room.lock().await;

            let pop = self.store.pop_or_enqueue(&party, cutoff).await?;
            self.expire_waiters(&pop.expired).await;

            match pop.popped {
                Some(host) => {
                    // Reservation: the host is out of the queue now, and
                    // the Pending record keeps its polls answering Waiting
                    // until the pairing settles.
                    if let Err(e) = self
                        .store
                        .put_outcome(&host.id, &PartyOutcome::Pending, self.result_ttl)
                        .await
                    {
                        if self.store.requeue_front(&host).await.is_err() {
                            error!(
                                target: "mm.matchmaker",
                                party_id = %host.id,
                                "Failed to restore waiter after reservation failure; party is lost"
                            );
                        }
                        return Err(e.into());
                    }
                    Some(host)
                }
                None => None,
            }
        };

        let Some(host) = host else {
            debug!(target: "mm.matchmaker", party_id = %party.id, "Arrival queued");
            metrics::record_match_outcome("waiting");
            return Ok(MatchResult::Waiting { party_id: party.id });
        };

        // Provider round-trip outside the room lock; the reservation keeps
        // the host claimed meanwhile.
        let started = std::time::Instant::now();
        match self.provider.create_session().await {
            Ok(session) => {
                metrics::record_session_creation(started.elapsed(), true);

                if let Err(e) = self
                    .store
                    .put_outcome(
                        &host.id,
                        &PartyOutcome::Paired {
                            session: session.clone(),
                        },
                        self.result_ttl,
                    )
                    .await
                {
                    warn!(
                        target: "mm.matchmaker",
                        host_id = %host.id,
                        error = %e,
                        "Failed to record pairing, restoring waiter"
                    );
                    self.restore_host(&host).await;
                    return Err(e.into());
                }

                info!(
                    target: "mm.matchmaker",
                    host_id = %host.id,
                    guest_id = %party.id,
                    session_id = %session.id,
                    "Paired two parties"
                );
                metrics::record_match_outcome("paired");

                Ok(MatchResult::Paired {
                    redirect_url: session.guest_url,
                })
            }
            Err(e) => {
                metrics::record_session_creation(started.elapsed(), false);
                warn!(
                    target: "mm.matchmaker",
                    host_id = %host.id,
                    error = %e,
                    "Session creation failed, restoring waiter"
                );
                metrics::record_match_outcome("session_failed");

                self.restore_host(&host).await;
                Err(e)
            }
        }
    }

    /// Resolve a waiting party by id.
    ///
    /// `Waiting` while the party is queued or its pairing is in flight;
    /// `Paired` with the host redirect exactly once after pairing;
    /// `Expired` exactly once after a timeout; `PartyNotFound` otherwise.
    #[instrument(skip_all, name = "mm.matchmaker.resolve", fields(party_id = %party_id))]
    pub async fn resolve_waiting(&self, party_id: &str) -> Result<MatchResult, MmError> {
        let _room = self.room.lock().await;

        if let Some(outcome) = self.store.get_outcome(party_id).await? {
            return match outcome {
                PartyOutcome::Pending => Ok(MatchResult::Waiting {
                    party_id: party_id.to_string(),
                }),
                PartyOutcome::Paired { .. } => {
                    match self.store.take_outcome(party_id).await? {
                        Some(PartyOutcome::Paired { session }) => {
                            debug!(
                                target: "mm.matchmaker",
                                party_id = %party_id,
                                session_id = %session.id,
                                "Delivered host redirect"
                            );
                            Ok(MatchResult::Paired {
                                redirect_url: session.host_url,
                            })
                        }
                        // Lost the take race with a poll on another instance
                        _ => Err(MmError::PartyNotFound(party_id.to_string())),
                    }
                }
                PartyOutcome::Expired => match self.store.take_outcome(party_id).await? {
                    Some(PartyOutcome::Expired) => Err(MmError::Expired(party_id.to_string())),
                    _ => Err(MmError::PartyNotFound(party_id.to_string())),
                },
            };
        }

        // No recorded outcome: the party is still queued, or unknown
        match self.store.get_waiter(party_id).await? {
            Some(waiter) if !waiter.is_stale(self.stale_cutoff_ms()) => Ok(MatchResult::Waiting {
                party_id: party_id.to_string(),
            }),
            Some(_) => {
                // Waited past the TTL; evict and deliver the expiry directly
                let _ = self.store.remove_waiter(party_id).await?;
                metrics::record_expired_waiters(1);
                debug!(target: "mm.matchmaker", party_id = %party_id, "Waiter expired on poll");
                Err(MmError::Expired(party_id.to_string()))
            }
            None => Err(MmError::PartyNotFound(party_id.to_string())),
        }
    }

    /// Drain stale waiters and record their expiry. Returns the eviction
    /// count. Called by the background sweeper.
    #[instrument(skip_all, name = "mm.matchmaker.expire_stale")]
    pub async fn expire_stale(&self) -> Result<usize, MmError> {
        let cutoff = self.stale_cutoff_ms();

        let _room = self.room.lock().await;
        let drained = self.store.drain_stale(cutoff).await?;
        self.expire_waiters(&drained).await;

        Ok(drained.len())
    }

    /// Current queue depth (health reporting).
    pub async fn queue_depth(&self) -> Result<usize, MmError> {
        Ok(self.store.queue_len().await?)
    }

    /// Write `Expired` tombstones for evicted waiters so a later poll
    /// still learns its fate. Best effort: a failed tombstone write
    /// degrades that party's poll to `PartyNotFound`, which must not
    /// abort the surrounding arrival.
    async fn expire_waiters(&self, waiters: &[WaitingParty]) {
        for waiter in waiters {
            match self
                .store
                .put_outcome(&waiter.id, &PartyOutcome::Expired, self.result_ttl)
                .await
            {
                Ok(()) => {
                    debug!(target: "mm.matchmaker", party_id = %waiter.id, "Waiter expired")
                }
                Err(e) => warn!(
                    target: "mm.matchmaker",
                    party_id = %waiter.id,
                    error = %e,
                    "Failed to record waiter expiry"
                ),
            }
        }

        if !waiters.is_empty() {
            metrics::record_expired_waiters(waiters.len() as u64);
        }
    }

    /// Put a popped host back at the head of the queue and clear its
    /// reservation after a failed pairing. Failures are logged loudly
    /// rather than propagated; the caller is already surfacing the
    /// pairing failure.
    async fn restore_host(&self, host: &WaitingParty) {
        let _room = self.room.lock().await;

        if let Err(e) = self.store.requeue_front(host).await {
            error!(
                target: "mm.matchmaker",
                party_id = %host.id,
                error = %e,
                "Failed to restore waiter after session failure; party is lost"
            );
            return;
        }

        if let Err(e) = self.store.delete_outcome(&host.id).await {
            // The leftover Pending record answers Waiting, which is still
            // accurate for a queued party; it falls out via its TTL
            warn!(
                target: "mm.matchmaker",
                party_id = %host.id,
                error = %e,
                "Failed to clear reservation after restore"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::models::SessionDescriptor;
    use crate::store::{MemoryMatchStore, PopOrEnqueue, StoreError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct MockProvider {
        calls: AtomicU32,
        fail: AtomicBool,
        delay: Duration,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionProvider for MockProvider {
        async fn create_session(&self) -> Result<SessionDescriptor, MmError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(MmError::UpstreamSession("mock failure".to_string()));
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SessionDescriptor {
                id: format!("session-{n}"),
                host_url: format!("https://calls.test/s/{n}"),
                guest_url: format!("https://calls.test/j/{n}"),
                created_at: Utc::now(),
            })
        }
    }

    // Delegates to an in-memory store but refuses Paired outcome writes
    // while `fail` is set.
    struct PairedWriteFailStore {
        inner: MemoryMatchStore,
        fail: AtomicBool,
    }

    impl PairedWriteFailStore {
        fn new() -> Self {
            Self {
                inner: MemoryMatchStore::new(),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MatchStore for PairedWriteFailStore {
        async fn pop_or_enqueue(
            &self,
            party: &WaitingParty,
            stale_before_ms: i64,
        ) -> Result<PopOrEnqueue, StoreError> {
            self.inner.pop_or_enqueue(party, stale_before_ms).await
        }

        async fn requeue_front(&self, party: &WaitingParty) -> Result<(), StoreError> {
            self.inner.requeue_front(party).await
        }

        async fn get_waiter(&self, party_id: &str) -> Result<Option<WaitingParty>, StoreError> {
            self.inner.get_waiter(party_id).await
        }

        async fn remove_waiter(&self, party_id: &str) -> Result<bool, StoreError> {
            self.inner.remove_waiter(party_id).await
        }

        async fn queue_len(&self) -> Result<usize, StoreError> {
            self.inner.queue_len().await
        }

        async fn put_outcome(
            &self,
            party_id: &str,
            outcome: &PartyOutcome,
            ttl: Duration,
        ) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) && matches!(outcome, PartyOutcome::Paired { .. }) {
                return Err(StoreError::Connection("outcome write refused".to_string()));
            }
            self.inner.put_outcome(party_id, outcome, ttl).await
        }

        async fn get_outcome(&self, party_id: &str) -> Result<Option<PartyOutcome>, StoreError> {
            self.inner.get_outcome(party_id).await
        }

        async fn take_outcome(&self, party_id: &str) -> Result<Option<PartyOutcome>, StoreError> {
            self.inner.take_outcome(party_id).await
        }

        async fn delete_outcome(&self, party_id: &str) -> Result<bool, StoreError> {
            self.inner.delete_outcome(party_id).await
        }

        async fn drain_stale(&self, stale_before_ms: i64) -> Result<Vec<WaitingParty>, StoreError> {
            self.inner.drain_stale(stale_before_ms).await
        }
    }

    fn engine(provider: Arc<MockProvider>) -> Matchmaker {
        engine_with_ttl(provider, Duration::from_secs(120))
    }

    fn engine_with_ttl(provider: Arc<MockProvider>, waiter_ttl: Duration) -> Matchmaker {
        Matchmaker::new(
            Arc::new(MemoryMatchStore::new()),
            provider,
            waiter_ttl,
            Duration::from_secs(600),
        )
    }

    fn party_id(result: &MatchResult) -> String {
        match result {
            MatchResult::Waiting { party_id } => party_id.clone(),
            MatchResult::Paired { .. } => panic!("expected Waiting, got Paired"),
        }
    }

    #[tokio::test]
    async fn test_first_arrival_waits() {
        let mm = engine(Arc::new(MockProvider::new()));

        let result = mm.arrive().await.unwrap();

        assert!(matches!(result, MatchResult::Waiting { .. }));
        assert_eq!(mm.queue_depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_arrival_pairs_with_first() {
        let provider = Arc::new(MockProvider::new());
        let mm = engine(provider.clone());

        let first = mm.arrive().await.unwrap();
        let host_id = party_id(&first);

        let second = mm.arrive().await.unwrap();
        match second {
            MatchResult::Paired { redirect_url } => {
                assert_eq!(redirect_url, "https://calls.test/j/0");
            }
            other => panic!("expected Paired, got {other:?}"),
        }

        // The host collects its own redirect into the same session
        let resolved = mm.resolve_waiting(&host_id).await.unwrap();
        match resolved {
            MatchResult::Paired { redirect_url } => {
                assert_eq!(redirect_url, "https://calls.test/s/0");
            }
            other => panic!("expected Paired, got {other:?}"),
        }

        assert_eq!(provider.call_count(), 1);
        assert_eq!(mm.queue_depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_host_redirect_delivered_exactly_once() {
        let mm = engine(Arc::new(MockProvider::new()));

        let host_id = party_id(&mm.arrive().await.unwrap());
        mm.arrive().await.unwrap();

        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Paired { .. }
        ));

        // Consumed: the party is now unknown
        assert!(matches!(
            mm.resolve_waiting(&host_id).await,
            Err(MmError::PartyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_while_waiting() {
        let mm = engine(Arc::new(MockProvider::new()));

        let id = party_id(&mm.arrive().await.unwrap());

        for _ in 0..3 {
            assert!(matches!(
                mm.resolve_waiting(&id).await.unwrap(),
                MatchResult::Waiting { .. }
            ));
        }
        assert_eq!(mm.queue_depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_party() {
        let mm = engine(Arc::new(MockProvider::new()));

        let result = mm.resolve_waiting("no-such-party").await;
        assert!(matches!(result, Err(MmError::PartyNotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_session_restores_waiter() {
        let provider = Arc::new(MockProvider::new());
        let mm = engine(provider.clone());

        let host_id = party_id(&mm.arrive().await.unwrap());

        provider.fail.store(true, Ordering::SeqCst);
        let result = mm.arrive().await;
        assert!(matches!(result, Err(MmError::UpstreamSession(_))));

        // The popped waiter is back and still reports Waiting
        assert_eq!(mm.queue_depth().await.unwrap(), 1);
        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Waiting { .. }
        ));

        // A later arrival pairs with the restored waiter
        provider.fail.store(false, Ordering::SeqCst);
        assert!(matches!(
            mm.arrive().await.unwrap(),
            MatchResult::Paired { .. }
        ));
        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Paired { .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_pairing_record_restores_waiter() {
        let store = Arc::new(PairedWriteFailStore::new());
        let provider = Arc::new(MockProvider::new());
        let mm = Matchmaker::new(
            store.clone(),
            provider.clone(),
            Duration::from_secs(120),
            Duration::from_secs(600),
        );

        let host_id = party_id(&mm.arrive().await.unwrap());

        // The session is created but the pairing record cannot be written;
        // the guest sees the store error
        store.fail.store(true, Ordering::SeqCst);
        let result = mm.arrive().await;
        assert!(matches!(result, Err(MmError::Store(_))));
        assert_eq!(provider.call_count(), 1);

        // The popped waiter is back and still reports Waiting
        assert_eq!(mm.queue_depth().await.unwrap(), 1);
        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Waiting { .. }
        ));

        // A later arrival pairs with the restored waiter
        store.fail.store(false, Ordering::SeqCst);
        assert!(matches!(
            mm.arrive().await.unwrap(),
            MatchResult::Paired { .. }
        ));
        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Paired { .. }
        ));
    }

    #[tokio::test]
    async fn test_stale_waiter_expires_on_resolve() {
        let mm = engine_with_ttl(Arc::new(MockProvider::new()), Duration::from_millis(50));

        let id = party_id(&mm.arrive().await.unwrap());
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Expiry is delivered once, then the party is unknown
        assert!(matches!(
            mm.resolve_waiting(&id).await,
            Err(MmError::Expired(_))
        ));
        assert!(matches!(
            mm.resolve_waiting(&id).await,
            Err(MmError::PartyNotFound(_))
        ));
        assert_eq!(mm.queue_depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_waiter_never_matches_new_arrival() {
        let mm = engine_with_ttl(Arc::new(MockProvider::new()), Duration::from_millis(50));

        let stale_id = party_id(&mm.arrive().await.unwrap());
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The new arrival skips the ghost and queues itself
        let result = mm.arrive().await.unwrap();
        assert!(matches!(result, MatchResult::Waiting { .. }));
        assert_eq!(mm.queue_depth().await.unwrap(), 1);

        // The skipped waiter got an Expired tombstone
        assert!(matches!(
            mm.resolve_waiting(&stale_id).await,
            Err(MmError::Expired(_))
        ));
        assert!(matches!(
            mm.resolve_waiting(&stale_id).await,
            Err(MmError::PartyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_stale_sweep() {
        let mm = engine_with_ttl(Arc::new(MockProvider::new()), Duration::from_millis(50));

        let id = party_id(&mm.arrive().await.unwrap());
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(mm.expire_stale().await.unwrap(), 1);
        assert_eq!(mm.queue_depth().await.unwrap(), 0);

        // The swept waiter's poll still learns its fate
        assert!(matches!(
            mm.resolve_waiting(&id).await,
            Err(MmError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_stale_leaves_fresh_waiters() {
        let mm = engine(Arc::new(MockProvider::new()));

        mm.arrive().await.unwrap();
        assert_eq!(mm.expire_stale().await.unwrap(), 0);
        assert_eq!(mm.queue_depth().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pending_reservation_reports_waiting_during_session_creation() {
        let provider = Arc::new(MockProvider::with_delay(Duration::from_millis(100)));
        let mm = Arc::new(engine(provider));

        let host_id = party_id(&mm.arrive().await.unwrap());

        let mm_guest = mm.clone();
        let guest = tokio::spawn(async move { mm_guest.arrive().await });

        // While the session is being created the host is neither queued
        // nor lost: the reservation answers Waiting
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Waiting { .. }
        ));

        let guest_result = guest.await.unwrap().unwrap();
        assert!(matches!(guest_result, MatchResult::Paired { .. }));

        assert!(matches!(
            mm.resolve_waiting(&host_id).await.unwrap(),
            MatchResult::Paired { .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_arrivals_pair_off_evenly() {
        let provider = Arc::new(MockProvider::new());
        let mm = Arc::new(engine(provider.clone()));

        let results =
            futures::future::join_all((0..10).map(|_| mm.arrive())).await;

        let mut paired_urls = HashSet::new();
        let mut waiting_ids = Vec::new();
        for result in results {
            match result.unwrap() {
                MatchResult::Paired { redirect_url } => {
                    paired_urls.insert(redirect_url);
                }
                MatchResult::Waiting { party_id } => waiting_ids.push(party_id),
            }
        }

        // 10 arrivals form 5 pairings: 5 guests redirected immediately,
        // 5 hosts polling; every pairing got its own session
        assert_eq!(paired_urls.len(), 5);
        assert_eq!(waiting_ids.len(), 5);
        assert_eq!(provider.call_count(), 5);

        let mut host_urls = HashSet::new();
        for id in &waiting_ids {
            match mm.resolve_waiting(id).await.unwrap() {
                MatchResult::Paired { redirect_url } => {
                    host_urls.insert(redirect_url);
                }
                other => panic!("host should resolve to Paired, got {other:?}"),
            }
        }
        assert_eq!(host_urls.len(), 5);
        assert_eq!(mm.queue_depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_odd_concurrent_arrivals_leave_one_waiter() {
        let provider = Arc::new(MockProvider::new());
        let mm = Arc::new(engine(provider.clone()));

        let results = futures::future::join_all((0..7).map(|_| mm.arrive())).await;

        let mut paired = 0;
        let mut waiting_ids = Vec::new();
        for result in results {
            match result.unwrap() {
                MatchResult::Paired { .. } => paired += 1,
                MatchResult::Waiting { party_id } => waiting_ids.push(party_id),
            }
        }

        assert_eq!(paired, 3);
        assert_eq!(waiting_ids.len(), 4);
        assert_eq!(provider.call_count(), 3);

        // Three of the waiters are hosts; exactly one is still queued
        let mut still_waiting = 0;
        for id in &waiting_ids {
            match mm.resolve_waiting(id).await.unwrap() {
                MatchResult::Paired { .. } => {}
                MatchResult::Waiting { .. } => still_waiting += 1,
            }
        }
        assert_eq!(still_waiting, 1);
        assert_eq!(mm.queue_depth().await.unwrap(), 1);
    }
}
