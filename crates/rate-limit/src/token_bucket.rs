use std::time::{Duration, Instant};

use crate::policy::BucketPolicy;

/// Mutable state of one bucket, owned by exactly one bucket key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketState {
    tokens_available: u32,
    last_refill: Instant,
}

impl TokenBucketState {
    /// A full bucket whose refill clock starts at `now`.
    pub fn full(policy: &BucketPolicy, now: Instant) -> Self {
        Self {
            tokens_available: policy.capacity(),
            last_refill: now,
        }
    }

    pub fn with_tokens(tokens_available: u32, last_refill: Instant) -> Self {
        Self {
            tokens_available,
            last_refill,
        }
    }

    pub fn tokens_available(&self) -> u32 {
        self.tokens_available
    }

    pub fn last_refill(&self) -> Instant {
        self.last_refill
    }
}

/// The token-bucket admission algorithm.
///
/// Refill is computed lazily from elapsed time on every call; there is no
/// background refill thread. Tokens are added in whole periods only, so a
/// partially elapsed period contributes nothing until it completes.
pub struct TokenBucket;

impl TokenBucket {
    /// Refill `state` for the whole periods elapsed up to `now`, then try to
    /// take one token. Returns `true` if the call is admitted.
    ///
    /// The caller must hold exclusive access to `state` for the duration of
    /// the call.
    pub fn try_consume(state: &mut TokenBucketState, policy: &BucketPolicy, now: Instant) -> bool {
        Self::refill(state, policy, now);

        if state.tokens_available >= 1 {
            state.tokens_available -= 1;
            true
        } else {
            false
        }
    }

    /// Time until the next refill boundary, or zero if a token is available.
    pub fn retry_after(state: &TokenBucketState, policy: &BucketPolicy, now: Instant) -> Duration {
        if state.tokens_available >= 1 {
            return Duration::ZERO;
        }
        let next_refill = state.last_refill + policy.refill_period();
        next_refill.saturating_duration_since(now)
    }

    fn refill(state: &mut TokenBucketState, policy: &BucketPolicy, now: Instant) {
        // A clock reading older than the last refill counts as no time passed.
        let elapsed = now.saturating_duration_since(state.last_refill);
        let period_nanos = policy.refill_period().as_nanos();
        let periods = elapsed.as_nanos() / period_nanos;
        if periods == 0 {
            return;
        }

        let added = periods.saturating_mul(u128::from(policy.refill_tokens()));
        let refilled = (u128::from(state.tokens_available) + added).min(u128::from(policy.capacity()));
        state.tokens_available = refilled as u32;

        // Advance by whole periods only so progress toward the next refill is kept.
        let advance = periods * period_nanos;
        state.last_refill += u64::try_from(advance)
            .map(Duration::from_nanos)
            .unwrap_or(elapsed);
    }
}
