/// Outcome of a single rate limit check.
///
/// Built once per [`RateLimiter::try_consume`](super::RateLimiter::try_consume)
/// call and carries everything the middleware needs for response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Bucket capacity (`X-RateLimit-Limit`).
    pub limit: u32,
    /// Tokens left after this call; always 0 when denied.
    pub remaining: u32,
    /// Unix time (seconds) when the bucket next expects fresh tokens.
    pub reset_epoch_seconds: u64,
    /// Seconds the client should wait; 0 when allowed.
    pub retry_after_seconds: u64,
}

impl RateLimitDecision {
    pub fn allowed(limit: u32, remaining: u32, reset_epoch_seconds: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_epoch_seconds,
            retry_after_seconds: 0,
        }
    }

    pub fn denied(limit: u32, reset_epoch_seconds: u64, retry_after_seconds: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_epoch_seconds,
            retry_after_seconds,
        }
    }
}
