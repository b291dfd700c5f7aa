use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlotgateError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller's bucket for this operation had no tokens left.
    #[error("{message}")]
    RateLimitExceeded {
        key: String,
        message: String,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("{0}")]
    ScheduleConflict(String),

    #[error("invalid schedule slot: {0}")]
    InvalidSlot(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SlotgateError {
    /// Stable machine-readable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            SlotgateError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            SlotgateError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            SlotgateError::ScheduleConflict(_) => "SCHEDULE_CONFLICT",
            SlotgateError::InvalidSlot(_) => "INVALID_SLOT",
            SlotgateError::NotFound(_) => "NOT_FOUND",
            SlotgateError::Forbidden(_) => "FORBIDDEN",
            SlotgateError::Unauthenticated => "UNAUTHENTICATED",
            SlotgateError::Config(_) => "CONFIG_ERROR",
            SlotgateError::Io(_) | SlotgateError::Serde(_) | SlotgateError::Other(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Expected conditions caused by the caller's request, as opposed to
    /// server faults. These are reported with their own message and are not
    /// logged as errors.
    pub fn is_caller_facing(&self) -> bool {
        !matches!(
            self,
            SlotgateError::Config(_)
                | SlotgateError::Io(_)
                | SlotgateError::Serde(_)
                | SlotgateError::Other(_)
        )
    }
}

pub type SlotgateResult<T> = Result<T, SlotgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_displays_policy_message() {
        let err = SlotgateError::RateLimitExceeded {
            key: "USER_1".into(),
            message: "slow down".into(),
            retry_after_secs: 3,
        };
        assert_eq!(err.to_string(), "slow down");
        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
        assert!(err.is_caller_facing());
    }

    #[test]
    fn internal_errors_are_not_caller_facing() {
        let err = SlotgateError::Other(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.is_caller_facing());
    }
}
