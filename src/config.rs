use crate::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 10;
pub const DEFAULT_DEADLINE_MS: u64 = 5_000;

/// Tuning knobs of the reconciler.
///
/// `max_attempts` bounds the read-decide-write cycles spent on one event when the
/// store reports a conflict or a transient failure. The n-th retry waits
/// `retry_backoff * n`. `deadline` bounds the whole call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub deadline: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            deadline: Duration::from_millis(DEFAULT_DEADLINE_MS),
        }
    }
}

impl ReconcilerConfig {
    pub fn new(max_attempts: u32, retry_backoff: Duration, deadline: Duration) -> Result<Self> {
        let config = Self {
            max_attempts,
            retry_backoff,
            deadline,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::ValidationError(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.deadline.is_zero() {
            return Err(Error::ValidationError(
                "deadline must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
