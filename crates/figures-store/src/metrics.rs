//! Store metrics collection.
//!
//! - Request counters by operation and status
//! - Latency histograms
//! - Retry counters
//! - Compare-and-swap outcomes

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total store requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "figures_store_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "figures_store_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "figures_store_latency_seconds";

    /// Documents returned by list/query calls, by collection.
    pub const DOCUMENTS_RETURNED_TOTAL: &str = "figures_store_documents_returned_total";

    /// Conditional writes by outcome (applied, conflict, missing).
    pub const CONDITIONAL_WRITES_TOTAL: &str = "figures_store_conditional_writes_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed store request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record how many documents a list or query returned.
pub fn record_documents_returned(collection: &str, count: usize) {
    counter!(
        names::DOCUMENTS_RETURNED_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(count as u64);
}

/// Record the outcome of a conditional write.
pub fn record_conditional_write(outcome: &'static str) {
    counter!(names::CONDITIONAL_WRITES_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
        assert!(names::CONDITIONAL_WRITES_TOTAL.contains("conditional"));
    }
}
