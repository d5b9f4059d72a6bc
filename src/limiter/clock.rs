//! Time sources for the token bucket limiter.
//!
//! The limiter needs two things from a clock: a value that never runs
//! backwards (for refill arithmetic) and a value that can be reported to
//! clients as a Unix timestamp (for `X-RateLimit-Reset`). [`SystemClock`]
//! provides both by anchoring a monotonic [`Instant`] to the wall clock once,
//! at construction.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Millisecond time source used by the limiter.
///
/// Implementations must be cheap to call; `now_millis` is invoked once per
/// rate limit decision.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Monotonic, epoch-aligned production clock.
#[derive(Debug, Clone)]
pub struct SystemClock {
    anchor: Instant,
    anchor_epoch_ms: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        // A system clock set before 1970 yields 0 rather than failing.
        let anchor_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        Self {
            anchor: Instant::now(),
            anchor_epoch_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_epoch_ms.saturating_add(elapsed)
    }
}

/// Manually driven clock for deterministic tests.
///
/// Time only moves when [`advance`](ManualClock::advance) or
/// [`set`](ManualClock::set) is called. Setting an earlier value simulates a
/// clock regression.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now_ms.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
