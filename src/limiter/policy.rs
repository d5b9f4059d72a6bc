use super::RateLimitError;

/// Shape of every bucket managed by a limiter.
///
/// A bucket holds at most `capacity` tokens and regains `refill_rate` tokens
/// for each whole `refill_interval_ms` that passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    capacity: u32,
    refill_rate: u32,
    refill_interval_ms: u64,
}

impl BucketPolicy {
    /// Create a validated policy.
    ///
    /// # Errors
    ///
    /// Returns a [`RateLimitError`] if any parameter is zero. Use a disabled
    /// layer rather than a zero capacity to turn limiting off.
    pub fn new(
        capacity: u32,
        refill_rate: u32,
        refill_interval_ms: u64,
    ) -> Result<Self, RateLimitError> {
        if capacity == 0 {
            return Err(RateLimitError::ZeroCapacity);
        }
        if refill_rate == 0 {
            return Err(RateLimitError::ZeroRefillRate);
        }
        if refill_interval_ms == 0 {
            return Err(RateLimitError::ZeroRefillInterval);
        }
        // Interval arithmetic is done in signed milliseconds.
        if i64::try_from(refill_interval_ms).is_err() {
            return Err(RateLimitError::RefillIntervalTooLarge(refill_interval_ms));
        }

        Ok(Self {
            capacity,
            refill_rate,
            refill_interval_ms,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> u32 {
        self.refill_rate
    }

    pub fn refill_interval_ms(&self) -> u64 {
        self.refill_interval_ms
    }

    /// Interval as signed milliseconds; `new` guarantees it fits.
    pub(crate) fn interval_ms_i64(&self) -> i64 {
        self.refill_interval_ms as i64
    }

    /// Tokens earned over `elapsed_ms`, counting whole intervals only.
    pub(crate) fn tokens_for(&self, elapsed_ms: i64) -> u64 {
        if elapsed_ms <= 0 {
            return 0;
        }
        let intervals = elapsed_ms as u64 / self.refill_interval_ms;
        intervals.saturating_mul(u64::from(self.refill_rate))
    }
}
