//! Metrics collection.
//!
//! # Metrics
//! - `router_invocations_total` (counter): invocations by method, status
//! - `router_invocation_duration_seconds` (histogram): latency distribution
//! - `router_unhandled_errors_total` (counter): errors no handler claimed
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the embedding process
//!   decides whether a recorder is installed
//! - Labels stay low-cardinality (method, status), never the path

use std::time::Instant;

use metrics::{counter, histogram};

/// Record one finished invocation.
pub fn record_invocation(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("router_invocations_total", &labels).increment(1);
    histogram!("router_invocation_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record an error that reached the adapter unclaimed.
pub fn record_unhandled_error(status: u16) {
    counter!("router_unhandled_errors_total", "status" => status.to_string()).increment(1);
}
