use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::key::BucketKey;
use crate::policy::BucketPolicy;
use crate::token_bucket::TokenBucketState;

/// One stored bucket: its state behind a per-bucket lock plus the last time
/// it was resolved, used for eviction.
#[derive(Debug)]
pub struct Bucket {
    state: Mutex<TokenBucketState>,
    last_used_ms: AtomicU64,
}

impl Bucket {
    fn new(state: TokenBucketState, tick: u64) -> Self {
        Self {
            state: Mutex::new(state),
            last_used_ms: AtomicU64::new(tick),
        }
    }

    /// Exclusive access to the bucket state. Refill and consume must happen
    /// under a single guard.
    pub fn lock(&self) -> MutexGuard<'_, TokenBucketState> {
        self.state.lock()
    }

    fn touch(&self, tick: u64) {
        self.last_used_ms.fetch_max(tick, Ordering::Relaxed);
    }

    fn last_used(&self) -> u64 {
        self.last_used_ms.load(Ordering::Relaxed)
    }
}

/// Process-wide map from bucket key to bucket state.
///
/// Buckets are created lazily on first use with compute-if-absent semantics,
/// so concurrent first calls for one key always share a single bucket. The
/// map is bounded: when an insert pushes it past `max_buckets`, the least
/// recently used buckets are evicted in one batch. Losing a bucket only
/// resets that caller's quota to full.
#[derive(Debug)]
pub struct BucketStore {
    buckets: DashMap<BucketKey, Arc<Bucket>>,
    max_buckets: usize,
    epoch: Instant,
    evicting: AtomicBool,
}

impl BucketStore {
    /// `epoch` anchors the store's internal usage timestamps; pass the
    /// limiter clock's current reading.
    pub fn new(max_buckets: usize, epoch: Instant) -> Self {
        Self {
            buckets: DashMap::new(),
            max_buckets: max_buckets.max(1),
            epoch,
            evicting: AtomicBool::new(false),
        }
    }

    /// Return the bucket for `key`, creating a full one governed by `policy`
    /// if none exists.
    pub fn resolve(&self, key: &BucketKey, policy: &BucketPolicy, now: Instant) -> Arc<Bucket> {
        let tick = self.tick(now);

        if let Some(existing) = self.buckets.get(key) {
            existing.touch(tick);
            return Arc::clone(existing.value());
        }

        let mut inserted = false;
        let bucket = Arc::clone(
            self.buckets
                .entry(key.clone())
                .or_insert_with(|| {
                    inserted = true;
                    Arc::new(Bucket::new(TokenBucketState::full(policy, now), tick))
                })
                .value(),
        );
        bucket.touch(tick);

        if inserted {
            tracing::trace!(key = %key, "created rate limit bucket");
            if self.buckets.len() > self.max_buckets {
                self.evict_lru(key);
            }
        }

        bucket
    }

    /// Current state of the bucket for `key`, if one exists.
    pub fn snapshot(&self, key: &BucketKey) -> Option<TokenBucketState> {
        self.buckets.get(key).map(|b| b.lock().clone())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn max_buckets(&self) -> usize {
        self.max_buckets
    }

    /// Remove buckets that have not been resolved within `ttl` of `now`.
    pub fn evict_idle(&self, now: Instant, ttl: Duration) -> usize {
        let now_tick = self.tick(now);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let before = self.buckets.len();

        self.buckets
            .retain(|_key, bucket| now_tick.saturating_sub(bucket.last_used()) < ttl_ms);

        let removed = before.saturating_sub(self.buckets.len());
        tracing::debug!(removed, remaining = self.buckets.len(), "idle bucket sweep complete");
        removed
    }

    /// Drop the least recently used buckets until the map is back under its
    /// bound, with headroom so the sweep does not rerun on every insert.
    fn evict_lru(&self, keep: &BucketKey) {
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let headroom = (self.max_buckets / 16).max(1);
        let target = self.max_buckets.saturating_sub(headroom);
        let excess = self.buckets.len().saturating_sub(target);

        if excess > 0 {
            let mut candidates: Vec<(u64, BucketKey)> = self
                .buckets
                .iter()
                .filter(|entry| entry.key() != keep)
                .map(|entry| (entry.value().last_used(), entry.key().clone()))
                .collect();
            candidates.sort_unstable_by_key(|(last_used, _)| *last_used);

            for (_, key) in candidates.into_iter().take(excess) {
                self.buckets.remove(&key);
            }

            tracing::debug!(
                evicted = excess,
                remaining = self.buckets.len(),
                "evicted least recently used buckets"
            );
        }

        self.evicting.store(false, Ordering::Release);
    }

    fn tick(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::RateLimitKey;
    use crate::token_bucket::TokenBucket;

    fn policy() -> BucketPolicy {
        BucketPolicy::new(5, 1, Duration::from_secs(60), "limited").unwrap()
    }

    fn key(op: &str, caller: &str) -> BucketKey {
        BucketKey::new(op.into(), RateLimitKey::user(caller))
    }

    #[test]
    fn resolve_returns_same_bucket() {
        let now = Instant::now();
        let store = BucketStore::new(100, now);
        let a = store.resolve(&key("op", "1"), &policy(), now);
        let b = store.resolve(&key("op", "1"), &policy(), now);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn new_bucket_starts_full() {
        let now = Instant::now();
        let store = BucketStore::new(100, now);
        let k = key("op", "1");
        store.resolve(&k, &policy(), now);

        let state = store.snapshot(&k).unwrap();
        assert_eq!(state.tokens_available(), 5);
        assert_eq!(state.last_refill(), now);
    }

    #[test]
    fn state_persists_between_resolves() {
        let now = Instant::now();
        let store = BucketStore::new(100, now);
        let k = key("op", "1");
        let p = policy();

        {
            let bucket = store.resolve(&k, &p, now);
            let mut state = bucket.lock();
            assert!(TokenBucket::try_consume(&mut state, &p, now));
        }

        assert_eq!(store.snapshot(&k).unwrap().tokens_available(), 4);
    }

    #[test]
    fn evicts_least_recently_used_past_bound() {
        let start = Instant::now();
        let store = BucketStore::new(16, start);
        let p = policy();

        for i in 0..16 {
            store.resolve(&key("op", &i.to_string()), &p, start + Duration::from_millis(i));
        }
        // Keep the oldest one warm.
        store.resolve(&key("op", "0"), &p, start + Duration::from_millis(100));

        store.resolve(&key("op", "new"), &p, start + Duration::from_millis(200));

        assert!(store.len() <= 16);
        assert!(store.snapshot(&key("op", "new")).is_some());
        assert!(store.snapshot(&key("op", "0")).is_some());
        assert!(store.snapshot(&key("op", "1")).is_none());
    }

    #[test]
    fn idle_sweep_removes_stale_buckets() {
        let start = Instant::now();
        let store = BucketStore::new(100, start);
        let p = policy();

        store.resolve(&key("op", "stale"), &p, start);
        store.resolve(&key("op", "fresh"), &p, start + Duration::from_secs(600));

        let removed = store.evict_idle(start + Duration::from_secs(601), Duration::from_secs(300));

        assert_eq!(removed, 1);
        assert!(store.snapshot(&key("op", "fresh")).is_some());
        assert!(store.snapshot(&key("op", "stale")).is_none());
    }
}
