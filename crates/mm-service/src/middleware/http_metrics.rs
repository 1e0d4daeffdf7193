//! HTTP metrics middleware for capturing all request/response metrics
//!
//! This middleware captures metrics for ALL HTTP responses including
//! framework-level errors that occur before handlers run:
//! - 400 Bad Request
//! - 404 Not Found
//! - 405 Method Not Allowed

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records HTTP request metrics for all responses
///
/// This captures:
/// - Request method
/// - Request path (normalized to prevent cardinality explosion)
/// - Response status code
/// - Request duration
///
/// Applied as the outermost layer to capture all responses including
/// framework-level errors.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status_code = response.status().as_u16();
    record_http_request(&method, &path, status_code, duration);

    response
}
