//! Metrics definitions for the matchmaking service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `mm_` prefix for the matchmaking service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: 5 values (parameterized paths)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: 3 values (waiting, paired, session_failed)

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `mm_http_requests_total`, `mm_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// This captures ALL HTTP responses including framework-level errors like:
/// - 400 Bad Request
/// - 404 Not Found
/// - 405 Method Not Allowed
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    // Normalize endpoint to prevent cardinality explosion
    let normalized_endpoint = normalize_endpoint(endpoint);

    // Determine status category for simplified querying
    let status = categorize_status_code(status_code);

    histogram!("mm_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("mm_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 | 307 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Replaces the party id segment with a placeholder.
fn normalize_endpoint(path: &str) -> String {
    // Known static paths
    match path {
        "/" => "/".to_string(),
        "/health" => "/health".to_string(),
        "/metrics" => "/metrics".to_string(),
        "/join" => "/join".to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Normalize paths with dynamic segments
fn normalize_dynamic_endpoint(path: &str) -> String {
    // Poll endpoint: /join/{party_id}
    if path.starts_with("/join/") {
        let parts: Vec<&str> = path.split('/').collect();

        // /join/{party_id} → parts.len() == 3
        if parts.len() == 3 {
            return "/join/{party_id}".to_string();
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

// ============================================================================
// Matchmaking Metrics
// ============================================================================

/// Record the outcome of an arrival
///
/// Metric: `mm_match_outcomes_total`
/// Labels: `outcome` (waiting, paired, session_failed)
pub fn record_match_outcome(outcome: &str) {
    counter!("mm_match_outcomes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record waiters evicted past their TTL
///
/// Metric: `mm_expired_waiters_total`
pub fn record_expired_waiters(count: u64) {
    counter!("mm_expired_waiters_total").increment(count);
}

/// Record the current queue depth
///
/// Metric: `mm_queue_depth`
///
/// Sampled by the stale sweeper on each pass.
pub fn record_queue_depth(depth: usize) {
    gauge!("mm_queue_depth").set(depth as f64);
}

// ============================================================================
// Session Provider Metrics
// ============================================================================

/// Record a session creation attempt against the provider
///
/// Metric: `mm_session_creations_total`, `mm_session_creation_duration_seconds`
/// Labels: `status`
pub fn record_session_creation(duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    histogram!("mm_session_creation_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("mm_session_creations_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an OAuth token refresh attempt
///
/// Metric: `mm_token_refresh_total`, `mm_token_refresh_duration_seconds`
/// Labels: `status`
pub fn record_token_refresh(duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };

    histogram!("mm_token_refresh_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("mm_token_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
