//! Concurrent keyed storage for per-client buckets.
//!
//! # Locking
//!
//! ```text
//!   DashMap shard lock      held only while looking up / inserting the Arc
//!          │
//!          ▼
//!   Arc<Mutex<Bucket>>      cloned out, shard guard dropped
//!          │
//!          ▼
//!   bucket.lock()           exclusive access to this one client's state
//! ```
//!
//! Request paths never hold a shard guard while locking a bucket, so two
//! clients only contend when they hash to the same shard, and then only for
//! the duration of a map lookup.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Mutable token state for one client key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Tokens currently available, `0..=capacity`.
    pub(crate) tokens: u32,
    /// Last time (epoch ms) tokens were added. Never moves backwards.
    pub(crate) last_refill_ms: i64,
}

impl Bucket {
    /// A full bucket observed for the first time at `now_ms`.
    pub fn full(capacity: u32, now_ms: i64) -> Self {
        Self {
            tokens: capacity,
            last_refill_ms: now_ms,
        }
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn last_refill_ms(&self) -> i64 {
        self.last_refill_ms
    }
}

/// Shared handle to a single bucket.
pub type SharedBucket = Arc<Mutex<Bucket>>;

/// Keyed container owning every bucket of a limiter.
///
/// Created at startup and owned by the limiter; there is no global instance.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: DashMap<String, SharedBucket>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the bucket for `key`, creating it with `init` if absent.
    ///
    /// Insertion goes through [`DashMap::entry`], so concurrent first access
    /// for the same key always observes a single bucket.
    pub fn get_or_insert_with<F>(&self, key: &str, init: F) -> SharedBucket
    where
        F: FnOnce() -> Bucket,
    {
        // Fast path: read lock on the shard, no key allocation.
        if let Some(existing) = self.buckets.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(init())));
        Arc::clone(entry.value())
    }

    /// Snapshot of the bucket for `key`, if one exists.
    pub fn snapshot(&self, key: &str) -> Option<Bucket> {
        let shared = self.buckets.get(key).map(|e| Arc::clone(e.value()))?;
        let bucket = shared.lock().clone();
        Some(bucket)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Drop every bucket.
    pub fn clear(&self) {
        self.buckets.clear();
    }

    /// Remove buckets for which `evictable` returns `true`.
    ///
    /// A bucket is skipped while any request holds a handle to it or its
    /// mutex is taken, so an in-flight decision can never be applied to a
    /// bucket that was already detached from the map. Returns the number of
    /// buckets removed.
    pub fn remove_where<F>(&self, mut evictable: F) -> usize
    where
        F: FnMut(&Bucket) -> bool,
    {
        let before = self.buckets.len();

        self.buckets.retain(|_, shared| {
            // The shard write lock is held here, so no new handle can be
            // cloned out while we inspect the count.
            if Arc::strong_count(shared) > 1 {
                return true;
            }
            match shared.try_lock() {
                Some(bucket) => !evictable(&bucket),
                None => true,
            }
        });

        before.saturating_sub(self.buckets.len())
    }
}
