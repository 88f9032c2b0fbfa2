//! Exponential backoff, generalized from `LazyPirateConfig::backoff_for_attempt`
//! to the four named parameters used throughout the worker strategies.

use std::time::Duration;

use fleet_types::FleetError;
use tokio_util::sync::CancellationToken;

/// Retry timing parameters shared by both strategies.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Backoff for attempt 1.
    pub initial: Duration,
    /// Backoff ceiling; growth stops here.
    pub max: Duration,
    /// Exponential growth factor per additional attempt.
    pub multiplier: f64,
    /// Additional attempts after the first, immediate one.
    pub max_retries: u32,
    /// Per-attempt collection/request timeout.
    pub timeout: Duration,
    /// Streaming-only: time since the last heartbeat signal before the
    /// stream is considered dead.
    pub heartbeat_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: 3,
            timeout: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Backoff for attempt `n`. Attempt 0 is immediate (zero delay);
    /// attempt `n >= 1` is `min(max, initial * multiplier^(n-1))`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi((attempt - 1) as i32);
        let millis = (self.initial.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        Duration::from_millis(millis.max(0.0) as u64).min(self.max)
    }

    /// Sleep for the backoff duration of `attempt`, racing against
    /// cancellation. Waking early due to cancellation returns
    /// `FleetError::Cancelled`, never a timeout.
    pub async fn cancellable_backoff(
        &self,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<(), FleetError> {
        let delay = self.backoff_for_attempt(attempt);
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(FleetError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            multiplier: 2.0,
            max_retries: 3,
            timeout: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn attempt_zero_is_immediate() {
        assert_eq!(config().backoff_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn attempt_one_is_initial() {
        assert_eq!(config().backoff_for_attempt(1), Duration::from_millis(100));
    }

    #[test]
    fn grows_exponentially() {
        let c = config();
        assert_eq!(c.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(c.backoff_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn caps_at_max() {
        let c = config();
        assert_eq!(c.backoff_for_attempt(10), Duration::from_secs(5));
        assert_eq!(c.backoff_for_attempt(1000), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_preempts_sleep() {
        let c = RetryConfig {
            initial: Duration::from_secs(30),
            ..config()
        };
        let token = CancellationToken::new();
        let token2 = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token2.cancel();
        });
        let result = c.cancellable_backoff(1, &token).await;
        assert!(matches!(result, Err(FleetError::Cancelled)));
    }

    #[tokio::test]
    async fn zero_attempt_never_blocks_on_cancellation() {
        let c = config();
        let token = CancellationToken::new();
        let result = c.cancellable_backoff(0, &token).await;
        assert!(result.is_ok());
    }
}
