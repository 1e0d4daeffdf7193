//! # Matchmaking Test Utilities
//!
//! Shared test utilities for the matchmaking service.
//!
//! This crate provides:
//! - Server test harness (`TestMmServer` for E2E tests)
//! - Mocked Zoom API (`MockZoom` with canned OAuth and meeting responses)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mm_test_utils::{MockZoom, TestMmServer};
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let zoom = MockZoom::standard().await;
//!     let server = TestMmServer::spawn(&zoom.uri()).await?;
//!
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod mock_zoom;
pub mod server_harness;

// Re-export commonly used items
pub use mock_zoom::MockZoom;
pub use server_harness::TestMmServer;
