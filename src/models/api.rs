use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Rate limiter statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Whether requests are being rate limited at all
    pub rate_limiting_enabled: bool,
    /// Client keys currently holding a bucket
    pub tracked_clients: usize,
    /// Bucket capacity (burst size)
    pub capacity: u32,
    /// Tokens restored per interval
    pub refill_rate: u32,
    /// Refill interval in milliseconds
    pub refill_interval_ms: u64,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}

/// Response of the sample protected endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
