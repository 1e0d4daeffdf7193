//! Matchmaking Service
//!
//! Entry point for the Sanamus matchmaking service. Pairs anonymous
//! visitors two at a time into freshly provisioned video call sessions.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect the match store (Redis when configured, in-memory otherwise)
//! 4. Build the Zoom session provider and the matchmaking engine
//! 5. Spawn the stale waiter sweeper
//! 6. Serve HTTP until a shutdown signal arrives

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mm_service::config::Config;
use mm_service::routes::{self, AppState};
use mm_service::secret::ExposeSecret;
use mm_service::services::{Matchmaker, ZoomClient};
use mm_service::store::{MatchStore, MemoryMatchStore, RedisMatchStore};
use mm_service::tasks;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mm_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Matchmaking Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        waiter_ttl_seconds = config.waiter_ttl_seconds,
        result_ttl_seconds = config.result_ttl_seconds,
        sweep_interval_seconds = config.sweep_interval_seconds,
        store = if config.redis_url.is_some() { "redis" } else { "memory" },
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before any metrics are recorded
    let metrics_handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        format!("Failed to install Prometheus metrics recorder: {e}")
    })?;

    // Connect the match store
    let store: Arc<dyn MatchStore> = match &config.redis_url {
        Some(redis_url) => {
            info!("Connecting to Redis...");
            let store = RedisMatchStore::new(redis_url.expose_secret())
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to connect to Redis");
                    e
                })?;
            info!("Redis connection established");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set; using in-memory store (single instance only)");
            Arc::new(MemoryMatchStore::new())
        }
    };

    // Build the session provider and the engine
    let provider = Arc::new(ZoomClient::new(&config).map_err(|e| {
        error!(error = %e, "Failed to build Zoom client");
        e
    })?);
    info!(
        zoom_account_id = %config.zoom_account_id,
        zoom_api_base_url = %config.zoom_api_base_url,
        "Zoom session provider ready"
    );

    let matchmaker = Arc::new(Matchmaker::new(
        store,
        provider,
        Duration::from_secs(config.waiter_ttl_seconds),
        Duration::from_secs(config.result_ttl_seconds),
    ));

    // Spawn the stale sweeper with a cancellation token for shutdown
    let shutdown_token = CancellationToken::new();
    let sweeper_handle = tokio::spawn(tasks::start_stale_sweeper(
        Arc::clone(&matchmaker),
        config.sweep_interval_seconds,
        shutdown_token.clone(),
    ));

    // Parse bind address before moving config into state
    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState { matchmaker, config });
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Matchmaking Service listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop the sweeper once the server has drained
    shutdown_token.cancel();
    if let Err(e) = sweeper_handle.await {
        error!(error = %e, "Stale sweeper task panicked during shutdown");
    }

    info!("Matchmaking Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Graceful shutdown drain period so in-flight polls finish
    let drain_secs: u64 = std::env::var("MM_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (MM_DRAIN_SECONDS=0)");
    }
}
