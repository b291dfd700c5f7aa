//! Per-caller, per-operation rate limiting for slotgate.
//!
//! Every protected operation carries an [`OperationPolicy`]: a token bucket
//! capacity, a refill amount and a refill period. Each caller of that
//! operation gets an independent bucket, created lazily on first use and
//! refilled lazily from elapsed time. There is no background refill thread.
//!
//! - [`KeyResolver`] turns a [`CallerContext`] into a [`RateLimitKey`]
//!   (`USER_<id>`, `IP_<addr>` or `UNKNOWN`).
//! - [`BucketStore`] maps `(operation, caller)` to a bucket, creating it with
//!   compute-if-absent semantics and evicting least-recently-used buckets
//!   past a size bound.
//! - [`TokenBucket`] makes the admit/reject decision under the bucket's
//!   own lock, so calls for different keys never contend.
//! - [`RateLimitInterceptor`] composes the three around an operation.

pub mod clock;
pub mod key;
pub mod policy;
pub mod store;
pub mod token_bucket;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use slotgate_common::{RateLimitConfig, SlotgateError, SlotgateResult};

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{BucketKey, CallerContext, KeyResolver, RateLimitKey};
pub use policy::{BucketPolicy, OperationPolicy};
pub use store::{Bucket, BucketStore};
pub use token_bucket::{TokenBucket, TokenBucketState};

/// Enforces operation policies for incoming calls.
///
/// Cheaply cloneable (backed by `Arc`); all clones share one bucket store.
#[derive(Clone)]
pub struct RateLimitInterceptor {
    inner: Arc<InterceptorInner>,
}

struct InterceptorInner {
    store: BucketStore,
    resolver: KeyResolver,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl RateLimitInterceptor {
    pub fn new(resolver: KeyResolver, max_buckets: usize, clock: Arc<dyn Clock>) -> Self {
        let store = BucketStore::new(max_buckets, clock.now());
        tracing::info!(max_buckets, "creating rate limit interceptor");
        Self {
            inner: Arc::new(InterceptorInner {
                store,
                resolver,
                clock,
                enabled: true,
            }),
        }
    }

    /// Build an interceptor from configuration using the system clock.
    pub fn from_config(config: &RateLimitConfig, identity_header: &str) -> Self {
        Self::from_config_with_clock(config, identity_header, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(
        config: &RateLimitConfig,
        identity_header: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = BucketStore::new(config.max_buckets, clock.now());
        if !config.enabled {
            tracing::warn!("rate limiting disabled by configuration");
        }
        Self {
            inner: Arc::new(InterceptorInner {
                store,
                resolver: KeyResolver::new(identity_header),
                clock,
                enabled: config.enabled,
            }),
        }
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.inner.resolver
    }

    pub fn store(&self) -> &BucketStore {
        &self.inner.store
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Consume one token from the caller's bucket for this operation.
    ///
    /// Fails with [`SlotgateError::RateLimitExceeded`] carrying the policy's
    /// message when the bucket is empty.
    pub fn admit(&self, op: &OperationPolicy, caller: &CallerContext) -> SlotgateResult<()> {
        if !self.inner.enabled {
            return Ok(());
        }

        let caller_key = self.inner.resolver.resolve(caller);
        let key = BucketKey::new(Arc::clone(op.operation()), caller_key);
        let policy = op.policy();
        let now = self.inner.clock.now();

        let bucket = self.inner.store.resolve(&key, policy, now);
        let mut state = bucket.lock();
        if TokenBucket::try_consume(&mut state, policy, now) {
            return Ok(());
        }

        let retry_after = TokenBucket::retry_after(&state, policy, now);
        drop(state);

        tracing::debug!(key = %key, retry_after_secs = retry_after.as_secs(), "call rate limited");
        Err(SlotgateError::RateLimitExceeded {
            key: key.caller.to_string(),
            message: policy.message().to_string(),
            retry_after_secs: ceil_secs(retry_after),
        })
    }

    /// Run `call` only if the caller is admitted under `op`.
    pub fn guard<T, F>(&self, op: &OperationPolicy, caller: &CallerContext, call: F) -> SlotgateResult<T>
    where
        F: FnOnce() -> T,
    {
        self.admit(op, caller)?;
        Ok(call())
    }

    /// Async form of [`guard`](Self::guard). The admission decision is made
    /// before `call` is first polled; a rejected future is dropped unpolled.
    pub async fn guard_async<F>(
        &self,
        op: &OperationPolicy,
        caller: &CallerContext,
        call: F,
    ) -> SlotgateResult<F::Output>
    where
        F: Future,
    {
        self.admit(op, caller)?;
        Ok(call.await)
    }

    /// Spawn a background thread that periodically drops buckets idle for
    /// longer than `idle_ttl`.
    ///
    /// The thread holds an `Arc` to the interceptor state and runs for the
    /// life of the process.
    pub fn start_cleanup_task(&self, interval: Duration, idle_ttl: Duration) -> std::io::Result<()> {
        let inner = Arc::clone(&self.inner);

        std::thread::Builder::new()
            .name("rate-limit-cleanup".into())
            .spawn(move || loop {
                std::thread::sleep(interval);
                let now = inner.clock.now();
                inner.store.evict_idle(now, idle_ttl);
                tracing::trace!("rate limiter cleanup tick completed");
            })?;

        Ok(())
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, capacity: u32) -> OperationPolicy {
        OperationPolicy::new(
            name,
            BucketPolicy::new(capacity, 1, Duration::from_secs(60), "slow down").unwrap(),
        )
    }

    fn interceptor() -> (RateLimitInterceptor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimitInterceptor::new(KeyResolver::default(), 1000, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn rejects_past_capacity_with_policy_message() {
        let (limiter, _) = interceptor();
        let book = op("book", 3);
        let caller = CallerContext::authenticated("1");

        for _ in 0..3 {
            assert!(limiter.admit(&book, &caller).is_ok());
        }

        match limiter.admit(&book, &caller) {
            Err(SlotgateError::RateLimitExceeded { key, message, retry_after_secs }) => {
                assert_eq!(key, "USER_1");
                assert_eq!(message, "slow down");
                assert_eq!(retry_after_secs, 60);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[test]
    fn rejected_call_never_runs() {
        let (limiter, _) = interceptor();
        let book = op("book", 1);
        let caller = CallerContext::authenticated("1");
        let mut runs = 0;

        assert_eq!(limiter.guard(&book, &caller, || { runs += 1; "ok" }).unwrap(), "ok");
        assert!(limiter.guard(&book, &caller, || runs += 1).is_err());
        assert_eq!(runs, 1);
    }

    #[test]
    fn operations_do_not_share_quota() {
        let (limiter, _) = interceptor();
        let caller = CallerContext::authenticated("1");
        let book = op("book", 1);
        let list = op("list", 1);

        assert!(limiter.admit(&book, &caller).is_ok());
        assert!(limiter.admit(&book, &caller).is_err());
        assert!(limiter.admit(&list, &caller).is_ok());
        assert_eq!(limiter.store().len(), 2);
    }

    #[test]
    fn refills_after_period() {
        let (limiter, clock) = interceptor();
        let book = op("book", 1);
        let caller = CallerContext::anonymous("192.0.2.1".parse().unwrap());

        assert!(limiter.admit(&book, &caller).is_ok());
        assert!(limiter.admit(&book, &caller).is_err());

        clock.advance(Duration::from_secs(60));
        assert!(limiter.admit(&book, &caller).is_ok());
    }

    #[test]
    fn disabled_interceptor_admits_everything() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimitInterceptor::from_config(&config, "x-user-id");
        let book = op("book", 1);
        let caller = CallerContext::default();

        for _ in 0..10 {
            assert!(limiter.admit(&book, &caller).is_ok());
        }
        assert!(limiter.store().is_empty());
    }

    #[tokio::test]
    async fn guard_async_runs_future_when_admitted() {
        let (limiter, _) = interceptor();
        let book = op("book", 1);
        let caller = CallerContext::authenticated("9");

        let value = limiter.guard_async(&book, &caller, async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert!(limiter.guard_async(&book, &caller, async { 8 }).await.is_err());
    }

    #[test]
    fn clone_shares_state() {
        let (limiter, _) = interceptor();
        let limiter2 = limiter.clone();
        let book = op("book", 2);
        let caller = CallerContext::authenticated("shared");

        assert!(limiter.admit(&book, &caller).is_ok());
        assert!(limiter2.admit(&book, &caller).is_ok());

        // Both clones drained the same bucket.
        assert!(limiter.admit(&book, &caller).is_err());
        assert!(limiter2.admit(&book, &caller).is_err());
    }
}
