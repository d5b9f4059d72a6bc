//! Per-client admission control.
//!
//! - [`RateLimiter`]: the capability the HTTP layer depends on
//! - [`TokenBucketLimiter`]: in-memory token bucket implementation
//! - [`BucketStore`]: concurrent per-key bucket storage
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`])
//!
//! # Distributed Limiting
//!
//! [`TokenBucketLimiter`] enforces limits per process. Several instances
//! behind a load balancer each grant the full budget. Exact global limits
//! need a `RateLimiter` implementation over a shared, atomically updated
//! store.

mod clock;
mod decision;
mod policy;
mod store;
mod token_bucket;

use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::RateLimitDecision;
pub use policy::BucketPolicy;
pub use store::{Bucket, BucketStore, SharedBucket};
pub use token_bucket::TokenBucketLimiter;

/// Decides whether a client may make one more request.
///
/// Implementations must be safe to call concurrently for any mix of keys and
/// must not block on I/O or on other keys' state. A check never fails: every
/// call yields a [`RateLimitDecision`].
pub trait RateLimiter: Send + Sync {
    /// Attempt to take one unit of budget for `key`.
    fn try_consume(&self, key: &str) -> RateLimitDecision;
}

impl<T: RateLimiter + ?Sized> RateLimiter for std::sync::Arc<T> {
    fn try_consume(&self, key: &str) -> RateLimitDecision {
        (**self).try_consume(key)
    }
}

/// Invalid rate limit configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("bucket capacity must be greater than 0; disable rate limiting instead")]
    ZeroCapacity,

    #[error("refill rate must be greater than 0")]
    ZeroRefillRate,

    #[error("refill interval must be greater than 0 ms")]
    ZeroRefillInterval,

    #[error("refill interval of {0} ms is too large")]
    RefillIntervalTooLarge(u64),
}
