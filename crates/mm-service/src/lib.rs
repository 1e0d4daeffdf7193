//! Matchmaking Service Library
//!
//! This library provides the core functionality for the Sanamus matchmaking
//! service - a small HTTP service that pairs anonymous visitors into
//! one-on-one video calls:
//!
//! - Match-or-enqueue arrival handling over a FIFO waiting queue
//! - At-most-once delivery of pairing outcomes to polling waiters
//! - TTL-based expiry of waiters who never found a partner
//! - Video session provisioning through the Zoom Server-to-Server
//!   OAuth API
//!
//! # Architecture
//!
//! The service follows the Handler -> Service -> Store pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/matchmaker.rs -> store/*.rs
//!                                   services/zoom.rs
//! ```
//!
//! The store is pluggable: a Redis-backed implementation for deployments
//! with multiple instances, and an in-memory implementation for local
//! development and tests.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Data models
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup
//! - `secret` - Secret wrapper re-exports
//! - `services` - Matchmaking engine and session provider
//! - `store` - Queue and outcome persistence
//! - `tasks` - Background stale sweeper

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod secret;
pub mod services;
pub mod store;
pub mod tasks;
