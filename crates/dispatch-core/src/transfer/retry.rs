//! Retry policy for transfer calls

use crate::config::{BackoffStrategy, TransferConfig};
use crate::error::DispatchError;
use log::warn;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            strategy: config.backoff.strategy,
            initial_delay: Duration::from_millis(config.backoff.initial_delay_ms),
            max_delay: Duration::from_millis(config.backoff.max_delay_ms),
        }
    }

    /// Retry immediately, mostly useful in tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            strategy: BackoffStrategy::Fixed,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.initial_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    /// Decide whether `operation` gets another attempt after failing with
    /// `error`, sleeping for the backoff delay if it does
    pub async fn backoff(&self, operation: &str, attempt: u32, error: &DispatchError) -> bool {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return false;
        }

        let delay = self.delay_after(attempt);
        warn!(
            "{} failed (attempt {}/{}): {}. Retrying in {:?}",
            operation, attempt, self.max_attempts, error, delay
        );
        tokio::time::sleep(delay).await;
        true
    }
}
