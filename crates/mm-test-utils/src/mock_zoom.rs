//! Mocked Zoom API for matchmaking tests.
//!
//! Wraps a wiremock server with the two endpoints the service talks to:
//! the server-to-server OAuth token exchange and meeting creation. The
//! meeting endpoint hands out a distinct meeting per call, mirroring Zoom.
//!
//! Wiremock serves the first mounted mock that matches, so a test that
//! needs a failing endpoint should combine [`MockZoom::start`] with the
//! individual mount helpers instead of layering over [`MockZoom::standard`].
//!
//! # Example
//!
//! ```rust,ignore
//! // Happy path
//! let zoom = MockZoom::standard().await;
//!
//! // Meeting creation outage
//! let zoom = MockZoom::start().await;
//! zoom.mount_token_endpoint().await;
//! zoom.mount_meetings_failure(500).await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// A wiremock-backed Zoom API double.
pub struct MockZoom {
    server: MockServer,
}

impl MockZoom {
    /// Start a bare mock with no endpoints mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Start a mock with the standard happy path mounted: token exchange
    /// plus sequential meeting creation.
    pub async fn standard() -> Self {
        let zoom = Self::start().await;
        zoom.mount_token_endpoint().await;
        zoom.mount_meetings_endpoint().await;
        zoom
    }

    /// Base URL to point both `ZOOM_OAUTH_BASE_URL` and `ZOOM_API_BASE_URL` at.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// The underlying wiremock server, for custom expectations.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Mount `POST /oauth/token` returning a long-lived test token.
    pub async fn mount_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "test-access-token",
                "token_type": "bearer",
                "expires_in": 3600,
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount `POST /oauth/token` rejecting every exchange with 401.
    pub async fn mount_token_rejection(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "reason": "Invalid client credentials",
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount `POST /v2/users/me/meetings` creating a distinct meeting per call.
    pub async fn mount_meetings_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path("/v2/users/me/meetings"))
            .respond_with(SequentialMeetings::default())
            .mount(&self.server)
            .await;
    }

    /// Mount `POST /v2/users/me/meetings` failing with the given status.
    pub async fn mount_meetings_failure(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v2/users/me/meetings"))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "code": 124,
                "message": "mock meeting failure",
            })))
            .mount(&self.server)
            .await;
    }
}

/// Responds to meeting creation with a fresh meeting id and URL pair per
/// call.
#[derive(Default)]
struct SequentialMeetings {
    counter: AtomicU64,
}

impl Respond for SequentialMeetings {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = 91_000_000_000 + n;
        ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": id,
            "join_url": format!("https://zoom.test/j/{id}"),
            "start_url": format!("https://zoom.test/s/{id}?zak=host-{n}"),
        }))
    }
}
