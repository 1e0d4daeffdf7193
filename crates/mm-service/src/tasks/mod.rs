//! Background tasks for the matchmaking service.
//!
//! # Tasks
//!
//! - `stale_sweeper` - Evicts waiters that outlived their TTL and records
//!   their expiry

pub mod stale_sweeper;

pub use stale_sweeper::start_stale_sweeper;
