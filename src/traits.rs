//! Shared trait abstractions for common patterns
//!
//! Retry bookkeeping and configuration handling are used by several types;
//! the traits here keep their behaviour consistent.

use crate::core::config::RetryConfig;
use crate::Result;

/// Trait for configurable components
pub trait Configurable {
    type Config: Clone;

    /// Get the current configuration
    fn config(&self) -> &Self::Config;

    /// Set new configuration
    fn set_config(&mut self, config: Self::Config) -> Result<()>;

    /// Validate configuration
    fn validate_config(config: &Self::Config) -> Result<()> {
        let _ = config; // Default implementation accepts all configs
        Ok(())
    }

    /// Update configuration with a partial change
    fn update_config<F>(&mut self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut Self::Config),
    {
        let mut config = self.config().clone();
        updater(&mut config);
        Self::validate_config(&config)?;
        self.set_config(config)
    }
}

/// Unified retry logic for failed loads
pub trait RetryLogic {
    fn get_retry_count(&self) -> u32;
    fn get_last_retry_time(&self) -> Option<std::time::Instant>;

    fn should_retry(&self, policy: &RetryConfig) -> bool {
        should_retry_with_backoff(
            self.get_retry_count(),
            self.get_last_retry_time(),
            policy.max_retries,
            policy.retry_delay_ms,
            policy.exponential_backoff,
        )
    }

    fn retries_exhausted(&self, policy: &RetryConfig) -> bool {
        self.get_retry_count() > policy.max_retries
    }
}

/// Standard retry logic implementation.
///
/// After the first attempt fails, up to `max_retries` further attempts are
/// allowed. The `n`-th retry waits `retry_delay_ms`, doubled `n - 1` times when
/// `exponential_backoff` is set.
pub fn should_retry_with_backoff(
    retry_count: u32,
    last_retry_time: Option<std::time::Instant>,
    max_retries: u32,
    retry_delay_ms: u64,
    exponential_backoff: bool,
) -> bool {
    // The first attempt is not a retry.
    if retry_count == 0 {
        return true;
    }
    if retry_count > max_retries {
        return false;
    }

    if let Some(last_retry) = last_retry_time {
        let delay_multiplier = if exponential_backoff {
            2_u64.saturating_pow(retry_count.saturating_sub(1))
        } else {
            1
        };
        let required_delay = retry_delay_ms.saturating_mul(delay_multiplier);
        last_retry.elapsed().as_millis() >= required_delay as u128
    } else {
        true
    }
}
