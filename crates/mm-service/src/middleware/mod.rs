//! Middleware for the matchmaking service.
//!
//! # Components
//!
//! - `http_metrics` - HTTP request metrics middleware

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
