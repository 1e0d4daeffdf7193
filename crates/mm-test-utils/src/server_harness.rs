//! Test server harness for E2E testing
//!
//! Provides `TestMmServer` for spawning real matchmaking server instances
//! in tests, wired to a mocked Zoom API and an in-memory match store.

use metrics_exporter_prometheus::PrometheusBuilder;
use mm_service::config::Config;
use mm_service::routes::{self, AppState};
use mm_service::services::{Matchmaker, ZoomClient};
use mm_service::store::MemoryMatchStore;
use mm_service::tasks;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the matchmaking server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_waiting_flow_e2e() -> Result<(), anyhow::Error> {
///     let zoom = MockZoom::standard().await;
///     let server = TestMmServer::spawn(&zoom.uri()).await?;
///
///     let response = reqwest::get(format!("{}/join", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestMmServer {
    addr: SocketAddr,
    config: Config,
    shutdown_token: CancellationToken,
    _server_handle: JoinHandle<()>,
    _sweeper_handle: JoinHandle<()>,
}

impl TestMmServer {
    /// Spawn a test server with default TTLs.
    ///
    /// The server will:
    /// - Use an in-memory match store
    /// - Point the Zoom client at `zoom_base_url` (typically a `MockZoom`)
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server and the stale sweeper in the background
    pub async fn spawn(zoom_base_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_waiter_ttl(zoom_base_url, 120).await
    }

    /// Spawn a test server with a custom waiter TTL (seconds).
    ///
    /// Expiry tests use a 1 second TTL and sleep past it.
    pub async fn spawn_with_waiter_ttl(
        zoom_base_url: &str,
        waiter_ttl_seconds: u64,
    ) -> Result<Self, anyhow::Error> {
        // Build configuration for test environment
        let vars = HashMap::from([
            ("ZOOM_CLIENT_ID".to_string(), "test-client".to_string()),
            ("ZOOM_CLIENT_SECRET".to_string(), "test-secret".to_string()),
            ("ZOOM_ACCOUNT_ID".to_string(), "test-account".to_string()),
            ("ZOOM_OAUTH_BASE_URL".to_string(), zoom_base_url.to_string()),
            ("ZOOM_API_BASE_URL".to_string(), zoom_base_url.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "MM_WAITER_TTL_SECONDS".to_string(),
                waiter_ttl_seconds.to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        // Per-server recorder handle; the global recorder stays untouched
        // so many servers can coexist in one test process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let provider = Arc::new(
            ZoomClient::new(&config)
                .map_err(|e| anyhow::anyhow!("Failed to build Zoom client: {}", e))?,
        );

        let matchmaker = Arc::new(Matchmaker::new(
            Arc::new(MemoryMatchStore::new()),
            provider,
            Duration::from_secs(config.waiter_ttl_seconds),
            Duration::from_secs(config.result_ttl_seconds),
        ));

        // Run the real sweeper so tests exercise the full task set
        let shutdown_token = CancellationToken::new();
        let sweeper_handle = tokio::spawn(tasks::start_stale_sweeper(
            Arc::clone(&matchmaker),
            config.sweep_interval_seconds,
            shutdown_token.clone(),
        ));

        let state = Arc::new(AppState {
            matchmaker,
            config: config.clone(),
        });

        // Build routes using mm-service's real route builder
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let server_handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            shutdown_token,
            _server_handle: server_handle,
            _sweeper_handle: sweeper_handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestMmServer {
    fn drop(&mut self) {
        // Stop the sweeper loop and abort both background tasks so the
        // test process cleans up promptly.
        self.shutdown_token.cancel();
        self._server_handle.abort();
        self._sweeper_handle.abort();
    }
}
