use std::sync::Arc;
use std::time::Duration;

use slotgate_common::{PolicyConfig, SlotgateError, SlotgateResult};

/// Immutable token-bucket parameters shared by every caller of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPolicy {
    capacity: u32,
    refill_tokens: u32,
    refill_period: Duration,
    message: Arc<str>,
}

impl BucketPolicy {
    /// Build a policy, rejecting zero capacity, refill amount or period.
    pub fn new(
        capacity: u32,
        refill_tokens: u32,
        refill_period: Duration,
        message: impl Into<Arc<str>>,
    ) -> SlotgateResult<Self> {
        if capacity == 0 {
            return Err(SlotgateError::Config("bucket capacity must be positive".into()));
        }
        if refill_tokens == 0 {
            return Err(SlotgateError::Config("refill token count must be positive".into()));
        }
        if refill_period.is_zero() {
            return Err(SlotgateError::Config("refill period must be positive".into()));
        }

        Ok(Self {
            capacity,
            refill_tokens,
            refill_period,
            message: message.into(),
        })
    }

    pub fn from_config(config: &PolicyConfig) -> SlotgateResult<Self> {
        Self::new(
            config.capacity,
            config.refill_tokens,
            Duration::from_secs(config.refill_duration_secs),
            config.message.as_str(),
        )
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_tokens(&self) -> u32 {
        self.refill_tokens
    }

    pub fn refill_period(&self) -> Duration {
        self.refill_period
    }

    /// User-facing text returned when a call is rejected.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A [`BucketPolicy`] bound to the operation it protects.
///
/// The operation id is part of every bucket key created under this policy,
/// which keeps quotas of different operations apart for the same caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPolicy {
    operation: Arc<str>,
    policy: BucketPolicy,
}

impl OperationPolicy {
    pub fn new(operation: impl Into<Arc<str>>, policy: BucketPolicy) -> Self {
        Self {
            operation: operation.into(),
            policy,
        }
    }

    pub fn from_config(operation: &str, config: &PolicyConfig) -> SlotgateResult<Self> {
        Ok(Self::new(operation, BucketPolicy::from_config(config)?))
    }

    pub fn operation(&self) -> &Arc<str> {
        &self.operation
    }

    pub fn policy(&self) -> &BucketPolicy {
        &self.policy
    }
}
