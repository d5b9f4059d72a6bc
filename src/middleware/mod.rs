//! HTTP middleware for per-client rate limiting.
//!
//! - **Client Keys**: Bearer token, forwarded address, or peer address
//! - **Trusted Proxies**: CIDR-based validation of `X-Forwarded-For` sources
//! - **Enforcement**: Tower layer that admits or rejects with 429
//!
//! # Architecture
//!
//! ```text
//! Request → RateLimitLayer ─┬─ exempt ───────────────────────────► Handler
//!                           └─ ClientKeyResolver → RateLimiter ─┬─► Handler (+ headers)
//!                                                               └─► 429 Too Many Requests
//! ```

pub mod client_key;
pub mod proxy;
pub mod rate_limit;

pub use client_key::{ClientKeyResolver, MAX_TOKEN_KEY_CHARS};
pub use proxy::{CidrRange, TrustedProxies};
pub use rate_limit::{RateLimitLayer, RateLimitService, apply_rate_limit_headers};
