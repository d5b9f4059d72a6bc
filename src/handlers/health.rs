//! Health, readiness, and statistics endpoints.
//!
//! - `GET /health` - Liveness check (exempt from rate limiting by default)
//! - `GET /ready` - Readiness probe; 503 once shutdown has begun
//! - `GET /stats` - Rate limiter statistics

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::{HealthResponse, StatsResponse};
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip_all)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// Returns 503 while the service is draining so load balancers stop
/// routing new traffic to it.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    if state.is_shutting_down() {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(StatusCode::OK)
    }
}

/// Rate limiter statistics.
///
/// # Response Body
///
/// ```json
/// {
///   "rate_limiting_enabled": true,
///   "tracked_clients": 12,
///   "capacity": 100,
///   "refill_rate": 10,
///   "refill_interval_ms": 1000,
///   "uptime_seconds": 3600
/// }
/// ```
#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let config = &state.config;

    Json(StatsResponse {
        rate_limiting_enabled: state.limiter.is_some(),
        tracked_clients: state.tracked_clients(),
        capacity: config.rate_limit_capacity,
        refill_rate: config.rate_limit_refill_rate,
        refill_interval_ms: config.rate_limit_refill_interval_ms,
        uptime_seconds: state.uptime_seconds(),
    })
}
