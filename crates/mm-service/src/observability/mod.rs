//! Observability for the matchmaking service.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
