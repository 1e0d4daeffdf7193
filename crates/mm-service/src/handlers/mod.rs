//! HTTP request handlers for the matchmaking service.

pub mod health;
pub mod join;
pub mod metrics;

pub use health::{health_check, root};
pub use join::{join, poll_party};
pub use metrics::metrics_handler;
