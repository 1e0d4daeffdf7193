//! Stale waiter sweeper background task.
//!
//! Arrivals already skip stale waiters, but a queue that sees no traffic
//! would otherwise hold ghosts forever. This task periodically drains
//! waiters past their TTL, writes their expiry tombstones, and samples the
//! queue depth gauge.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the
//! token is cancelled, the task completes its current iteration and exits
//! cleanly.

use crate::observability::metrics;
use crate::services::Matchmaker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Start the stale sweeper background task.
///
/// Runs one sweep per interval until the cancellation token is triggered.
/// The interval comes from `Config::sweep_interval_seconds`.
#[instrument(skip_all, name = "mm.task.stale_sweeper")]
pub async fn start_stale_sweeper(
    matchmaker: Arc<Matchmaker>,
    interval_seconds: u64,
    cancel_token: CancellationToken,
) {
    info!(
        target: "mm.task.stale_sweeper",
        interval_seconds,
        "Starting stale sweeper task"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_sweep(&matchmaker).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "mm.task.stale_sweeper",
                    "Stale sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "mm.task.stale_sweeper", "Stale sweeper stopped");
}

/// Run a single sweep iteration.
///
/// Separated from the main loop to allow direct testing. Errors are logged
/// rather than propagated so a store hiccup never kills the task.
pub(crate) async fn run_sweep(matchmaker: &Matchmaker) {
    match matchmaker.expire_stale().await {
        Ok(0) => {}
        Ok(count) => {
            info!(
                target: "mm.task.stale_sweeper",
                expired_count = count,
                "Swept stale waiters"
            );
        }
        Err(e) => {
            error!(
                target: "mm.task.stale_sweeper",
                error = %e,
                "Failed to sweep stale waiters"
            );
        }
    }

    match matchmaker.queue_depth().await {
        Ok(depth) => metrics::record_queue_depth(depth),
        Err(e) => {
            error!(
                target: "mm.task.stale_sweeper",
                error = %e,
                "Failed to sample queue depth"
            );
        }
    }
}
