//! # tollgate
//!
//! Per-client token-bucket admission control for Axum services:
//!
//! - **Token buckets**: Burst capacity with integer refill per interval
//! - **Per-key isolation**: Sharded bucket store, one lock per client
//! - **Client identity**: Bearer token, `X-Forwarded-For`, or peer address
//! - **Wire contract**: `X-RateLimit-*` headers, `Retry-After`, JSON 429 body
//! - **Bounded memory**: Background eviction of idle buckets
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RateLimitLayer (exempt check → key → decision → headers)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ClientKeyResolver            RateLimiter (trait)           │
//! │                               └─ TokenBucketLimiter         │
//! │                                  └─ BucketStore + Clock     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, ready, stats, ping)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use tollgate::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! RATE_LIMIT_CAPACITY=100 RATE_LIMIT_REFILL_RATE=10 RATE_LIMIT_REFILL_INTERVAL_MS=1000 cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use limiter::{
    BucketPolicy, BucketStore, Clock, ManualClock, RateLimitDecision, RateLimiter, SystemClock,
    TokenBucketLimiter,
};
pub use middleware::{ClientKeyResolver, RateLimitLayer};
pub use routes::build_router;
pub use state::AppState;
