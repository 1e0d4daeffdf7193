//! Service layer: the matchmaking engine and the session provider adapter.

use async_trait::async_trait;

use crate::errors::MmError;
use crate::models::SessionDescriptor;

pub mod matchmaker;
pub mod zoom;

pub use matchmaker::Matchmaker;
pub use zoom::ZoomClient;

/// Capability seam between the engine and the external video-call provider.
///
/// The engine only needs one operation; everything about tokens, wire
/// formats, and policy settings stays inside the adapter. Tests substitute
/// a mock implementation.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Create a fresh two-party call session and return its redirect URLs.
    async fn create_session(&self) -> Result<SessionDescriptor, MmError>;
}
