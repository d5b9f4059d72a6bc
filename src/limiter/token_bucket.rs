//! In-memory token bucket limiter.
//!
//! # Algorithm
//!
//! Each client key owns a bucket of at most `capacity` tokens. On every check:
//!
//! 1. Whole refill intervals elapsed since the last refill are converted to
//!    tokens (`intervals * refill_rate`), capped at `capacity`.
//! 2. One token is taken if available; otherwise the request is denied and
//!    told how long until the current interval completes.
//!
//! Partial intervals never earn fractional tokens, so a client can never
//! exceed the configured rate through rounding.
//!
//! # Clock Regressions
//!
//! If the clock reports a time earlier than the last refill, elapsed time is
//! treated as zero: no tokens are added, none are taken away, and the refill
//! timestamp is left where it was.

use std::sync::Arc;

use tracing::trace;

use super::clock::{Clock, SystemClock};
use super::store::{Bucket, BucketStore};
use super::{BucketPolicy, RateLimitDecision, RateLimiter};

/// Per-key token bucket limiter backed by a [`BucketStore`].
pub struct TokenBucketLimiter {
    policy: BucketPolicy,
    store: BucketStore,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    /// Create a limiter using the system clock.
    pub fn new(policy: BucketPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock::new()))
    }

    /// Create a limiter with an explicit time source.
    pub fn with_clock(policy: BucketPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            store: BucketStore::new(),
            clock,
        }
    }

    pub fn policy(&self) -> &BucketPolicy {
        &self.policy
    }

    pub fn store(&self) -> &BucketStore {
        &self.store
    }

    /// Number of client keys currently holding a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Forget every client.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Evict buckets that would already be full if refilled now.
    ///
    /// A fresh bucket also starts full, so dropping these changes no future
    /// decision. Returns the number of buckets removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now_millis();
        let policy = self.policy;

        self.store.remove_where(|bucket| {
            let earned = policy.tokens_for(now - bucket.last_refill_ms);
            u64::from(bucket.tokens).saturating_add(earned) >= u64::from(policy.capacity())
        })
    }

    /// Add tokens for whole intervals elapsed since the last refill.
    ///
    /// Returns the (non-negative) elapsed milliseconds used for the
    /// computation.
    fn refill(&self, bucket: &mut Bucket, now: i64) -> i64 {
        let elapsed = (now - bucket.last_refill_ms).max(0);

        if elapsed >= self.policy.interval_ms_i64() {
            let earned = self.policy.tokens_for(elapsed);
            let capacity = u64::from(self.policy.capacity());
            let tokens = u64::from(bucket.tokens).saturating_add(earned).min(capacity);
            // min(capacity) keeps this within u32
            bucket.tokens = tokens as u32;
            bucket.last_refill_ms = now;
        }

        elapsed
    }

    fn reset_epoch_seconds(&self, bucket: &Bucket) -> u64 {
        let reset_ms = bucket
            .last_refill_ms
            .saturating_add(self.policy.interval_ms_i64());
        u64::try_from(reset_ms / 1000).unwrap_or(0)
    }

    fn retry_after_seconds(&self, elapsed: i64) -> u64 {
        let wait_ms = (self.policy.interval_ms_i64() - elapsed).max(0) as u64;
        wait_ms.div_ceil(1000).max(1)
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn try_consume(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let capacity = self.policy.capacity();

        let shared = self
            .store
            .get_or_insert_with(key, || Bucket::full(capacity, now));
        let mut bucket = shared.lock();

        let elapsed = self.refill(&mut bucket, now);
        let reset = self.reset_epoch_seconds(&bucket);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            trace!(key, remaining = bucket.tokens, "Token consumed");
            RateLimitDecision::allowed(capacity, bucket.tokens, reset)
        } else {
            let retry_after = self.retry_after_seconds(elapsed);
            trace!(key, retry_after, "Bucket empty");
            RateLimitDecision::denied(capacity, reset, retry_after)
        }
    }
}

impl std::fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("policy", &self.policy)
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}
