//! Zoom session provider adapter.
//!
//! Speaks Zoom's server-to-server OAuth flow: a credential exchange against
//! `{oauth_base_url}/oauth/token` yields a short-lived access token, which
//! authorizes meeting creation against `{api_base_url}/v2/users/me/meetings`.
//! The token is cached and reused until it has less than the safety margin
//! of validity remaining.
//!
//! # Security
//!
//! - Client secret and access tokens are `SecretString` (never logged)
//! - Rejection bodies from the token endpoint are logged at trace level only
//! - Token acquisition/refresh events are logged (without values)
//! - HTTP timeouts prevent hanging connections

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};

use crate::config::Config;
use crate::errors::MmError;
use crate::models::SessionDescriptor;
use crate::observability::metrics;
use crate::secret::{ExposeSecret, SecretString};
use crate::services::SessionProvider;

/// Remaining-validity margin below which a cached token is not reused.
///
/// Covers clock differences with Zoom and the time the subsequent meeting
/// request spends in flight, so a request never departs with a token that
/// expires mid-call.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// HTTP request timeout for provider calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection timeout for provider calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Topic assigned to every created meeting.
const SESSION_TOPIC: &str = "Sanamus Matchmaking";

/// Zoom meeting type 1: instant meeting.
const MEETING_TYPE_INSTANT: u8 = 1;

/// OAuth token response from Zoom.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: String,
    expires_in: i64,
}

impl std::fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Meeting creation response from Zoom.
#[derive(Deserialize)]
struct CreateMeetingResponse {
    id: u64,
    join_url: String,
    start_url: String,
}

impl std::fmt::Debug for CreateMeetingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // start_url embeds a host credential (ZAK token)
        f.debug_struct("CreateMeetingResponse")
            .field("id", &self.id)
            .field("join_url", &self.join_url)
            .field("start_url", &"[REDACTED]")
            .finish()
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Whether the token still has more than the safety margin remaining.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::try_seconds(TOKEN_REFRESH_MARGIN_SECS).unwrap_or_default()
            < self.expires_at
    }
}

/// Zoom-backed `SessionProvider`.
///
/// The token cache lives behind an async mutex that stays held across a
/// refresh, so a burst of concurrent callers performs exactly one
/// credential exchange and the rest reuse the published token.
pub struct ZoomClient {
    http_client: reqwest::Client,
    oauth_base_url: String,
    api_base_url: String,
    client_id: String,
    client_secret: SecretString,
    account_id: String,
    token_cache: Mutex<Option<CachedToken>>,
}

impl ZoomClient {
    /// Build the client from service configuration.
    ///
    /// # Errors
    ///
    /// Returns `MmError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, MmError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| MmError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            oauth_base_url: config.zoom_oauth_base_url.clone(),
            api_base_url: config.zoom_api_base_url.clone(),
            client_id: config.zoom_client_id.clone(),
            client_secret: config.zoom_client_secret.clone(),
            account_id: config.zoom_account_id.clone(),
            token_cache: Mutex::new(None),
        })
    }

    /// Return a valid access token, refreshing the cache if needed.
    #[instrument(skip_all, name = "mm.zoom.acquire_token")]
    async fn acquire_access_token(&self) -> Result<SecretString, MmError> {
        let mut cache = self.token_cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now()) {
                trace!(target: "mm.zoom", "Using cached access token");
                return Ok(cached.token.clone());
            }
        }

        // The lock is held across the exchange: concurrent callers queue
        // here and pick up the refreshed token instead of racing their own
        // exchanges against Zoom.
        let started = std::time::Instant::now();
        let refreshed = match self.exchange_credentials().await {
            Ok(refreshed) => {
                metrics::record_token_refresh(started.elapsed(), true);
                refreshed
            }
            Err(e) => {
                metrics::record_token_refresh(started.elapsed(), false);
                return Err(e);
            }
        };
        let token = refreshed.token.clone();
        *cache = Some(refreshed);

        Ok(token)
    }

    /// Perform the server-to-server OAuth credential exchange.
    async fn exchange_credentials(&self) -> Result<CachedToken, MmError> {
        let url = format!("{}/oauth/token", self.oauth_base_url);

        debug!(target: "mm.zoom", url = %url, "Requesting access token");

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.account_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                debug!(target: "mm.zoom", error = %e, "Token request failed");
                MmError::UpstreamAuth(format!("token request failed: {e}"))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // The body may echo credential details; keep it out of normal logs
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(target: "mm.zoom", status = %status, "Token exchange rejected");
            trace!(target: "mm.zoom", body = %body, "Token exchange response body");
            return Err(MmError::UpstreamAuth(format!("status {status}")));
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            warn!(target: "mm.zoom", error = %e, "Failed to parse token response");
            MmError::UpstreamAuth(format!("invalid token response: {e}"))
        })?;

        let expires_at = Utc::now()
            + chrono::Duration::try_seconds(token_response.expires_in).unwrap_or_default();

        debug!(
            target: "mm.zoom",
            expires_in_secs = token_response.expires_in,
            "Access token acquired"
        );

        Ok(CachedToken {
            token: SecretString::from(token_response.access_token),
            expires_at,
        })
    }
}

#[async_trait]
impl SessionProvider for ZoomClient {
    #[instrument(skip_all, name = "mm.zoom.create_session")]
    async fn create_session(&self) -> Result<SessionDescriptor, MmError> {
        let token = self.acquire_access_token().await?;

        let url = format!("{}/v2/users/me/meetings", self.api_base_url);

        // Fixed policy: anonymous visitors must get straight into an
        // instant meeting with no waiting room or host approval in the way
        let body = serde_json::json!({
            "topic": SESSION_TOPIC,
            "type": MEETING_TYPE_INSTANT,
            "settings": {
                "join_before_host": true,
                "approval_type": 0,
                "waiting_room": false,
                "mute_upon_entry": true,
                "host_video": false,
                "participant_video": false,
            }
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "mm.zoom", error = %e, "Meeting request failed");
                MmError::UpstreamSession(format!("meeting request failed: {e}"))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(
                target: "mm.zoom",
                status = %status,
                body = %body,
                "Meeting creation rejected"
            );
            return Err(MmError::UpstreamSession(format!("status {status}")));
        }

        let meeting: CreateMeetingResponse = response.json().await.map_err(|e| {
            warn!(target: "mm.zoom", error = %e, "Failed to parse meeting response");
            MmError::UpstreamSession(format!("invalid meeting response: {e}"))
        })?;

        debug!(target: "mm.zoom", meeting_id = meeting.id, "Session created");

        Ok(SessionDescriptor {
            id: meeting.id.to_string(),
            host_url: meeting.start_url,
            guest_url: meeting.join_url,
            created_at: Utc::now(),
        })
    }
}
