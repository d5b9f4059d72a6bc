//! Prometheus metrics for rate limiting observability.
//!
//! Metrics are exposed on a dedicated listener when `METRICS_PORT` is non-zero.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `tollgate_requests_total` - Requests seen by the limiter (label: `outcome` =
//!   `allowed` | `denied` | `exempt`)
//! - `tollgate_buckets_evicted_total` - Idle buckets removed by the sweeper
//!
//! ## Gauges
//! - `tollgate_tracked_clients` - Client keys currently holding a bucket
//!
//! Recording functions are safe to call before (or without) [`init_metrics`];
//! the `metrics` facade discards values when no recorder is installed.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "tollgate_requests_total";
    pub const BUCKETS_EVICTED_TOTAL: &str = "tollgate_buckets_evicted_total";
    pub const TRACKED_CLIENTS: &str = "tollgate_tracked_clients";
}

/// How the limiter handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Allowed,
    Denied,
    Exempt,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Allowed => "allowed",
            RequestOutcome::Denied => "denied",
            RequestOutcome::Exempt => "exempt",
        }
    }
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. the port is
/// taken or a recorder already exists).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Requests evaluated by the rate limiter, by outcome"
    );
    describe_counter!(
        names::BUCKETS_EVICTED_TOTAL,
        "Idle client buckets evicted by the background sweeper"
    );
    describe_gauge!(
        names::TRACKED_CLIENTS,
        "Client keys currently holding a token bucket"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_request_outcome(outcome: RequestOutcome) {
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_buckets_evicted(count: u64) {
    counter!(names::BUCKETS_EVICTED_TOTAL).increment(count);
}

pub fn set_tracked_clients(count: usize) {
    gauge!(names::TRACKED_CLIENTS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only verify recording is a no-op without an installed recorder.

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RequestOutcome::Allowed.as_str(), "allowed");
        assert_eq!(RequestOutcome::Denied.as_str(), "denied");
        assert_eq!(RequestOutcome::Exempt.as_str(), "exempt");
    }

    #[test]
    fn test_record_without_recorder() {
        record_request_outcome(RequestOutcome::Allowed);
        record_buckets_evicted(3);
        set_tracked_clients(42);
    }
}
