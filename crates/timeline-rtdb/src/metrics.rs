//! Realtime Database metrics collection.
//!
//! Provides standardized metrics for monitoring database operations:
//! - Request counters by operation and status
//! - Latency histograms
//! - Stream reconnect counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total database requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "rtdb_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "rtdb_latency_seconds";

    /// Total change stream reconnects.
    pub const STREAM_RECONNECTS_TOTAL: &str = "rtdb_stream_reconnects_total";
}

/// Record metrics for a completed database request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    let status_str = status.to_string();

    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status_str
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a change stream reconnect.
pub fn record_reconnect() {
    counter!(names::STREAM_RECONNECTS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::STREAM_RECONNECTS_TOTAL.contains("reconnects"));
    }
}
