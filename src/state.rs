//! Shared application state for Axum handlers.
//!
//! Holds the configuration and the process-wide [`TokenBucketLimiter`]. The
//! limiter is constructed here, once, and injected into the router; there is
//! no global bucket registry.
//!
//! # Structured Concurrency
//!
//! The idle bucket sweeper is managed with `tokio_util::task::TaskTracker`
//! and `CancellationToken`. Call `shutdown()` to stop it before exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppResult;
use crate::limiter::TokenBucketLimiter;
use crate::metrics::{record_buckets_evicted, set_tracked_clients};

/// Shared application state for Axum handlers.
///
/// Cheap to clone; all fields are reference counted.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config)?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Token bucket limiter (None when rate limiting is disabled)
    pub limiter: Option<Arc<TokenBucketLimiter>>,
    /// Timestamp when the application started
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Build state from configuration, creating the limiter if enabled.
    ///
    /// Must be called within a Tokio runtime: the bucket sweeper is spawned
    /// here when `bucket_sweep_interval` is non-zero.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRateLimit` if the rate limit settings do
    /// not form a valid bucket policy.
    pub fn new(config: Config) -> AppResult<Self> {
        let limiter = if config.rate_limiting_enabled() {
            Some(Arc::new(TokenBucketLimiter::new(config.bucket_policy()?)))
        } else {
            None
        };

        Ok(Self::from_parts(config, limiter))
    }

    /// Build state around an existing limiter (e.g. one with a manual clock).
    pub fn with_limiter(config: Config, limiter: Arc<TokenBucketLimiter>) -> Self {
        Self::from_parts(config, Some(limiter))
    }

    fn from_parts(config: Config, limiter: Option<Arc<TokenBucketLimiter>>) -> Self {
        let state = Self {
            config: Arc::new(config),
            limiter,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        if let Some(limiter) = &state.limiter
            && state.config.bucket_sweep_enabled()
        {
            state.spawn_bucket_sweeper(Arc::clone(limiter), state.config.bucket_sweep_interval);
        }

        state
    }

    /// Spawn the background task that evicts idle buckets.
    ///
    /// Only buckets that have refilled to capacity are removed, so eviction
    /// never changes a client's next decision.
    fn spawn_bucket_sweeper(&self, limiter: Arc<TokenBucketLimiter>, period: Duration) {
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Bucket sweeper received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = limiter.evict_idle();
                        let tracked = limiter.tracked_keys();
                        record_buckets_evicted(evicted as u64);
                        set_tracked_clients(tracked);
                        debug!(evicted, tracked, "Idle bucket sweep complete");
                    }
                }
            }

            debug!("Bucket sweeper shutting down");
        });
    }

    /// Number of clients currently holding a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.as_ref().map_or(0, |l| l.tracked_keys())
    }

    /// Whether `shutdown()` has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Gracefully stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
