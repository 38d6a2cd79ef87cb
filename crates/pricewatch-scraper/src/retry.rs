//! Exponential backoff retry keyed on error category.
//!
//! Only categories that a second attempt could plausibly fix are retried.
//! Parse failures and implausible prices are deterministic for a given page,
//! so they are surfaced immediately.

use std::future::Future;
use std::time::Duration;

use pricewatch_core::{AppConfig, ErrorCategory, Tier};
use rand::Rng;

use crate::error::ScrapeError;

/// Upper bound for a single backoff sleep, before jitter.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Attempt budget and backoff shape shared by every tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Jitter as a fraction of the computed delay, in `0.0..=1.0`.
    pub jitter_ratio: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            jitter_ratio: 0.25,
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            jitter_ratio: config.retry_jitter_ratio.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    settings: RetrySettings,
    retryable: Vec<ErrorCategory>,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(settings: RetrySettings, retryable: Vec<ErrorCategory>) -> Self {
        Self {
            settings,
            retryable,
        }
    }

    /// Policy for one tier.
    ///
    /// Every tier retries network errors and timeouts. Bot detection is only
    /// retried by [`Tier::UnblockedFetch`], whose proxy rotation makes a
    /// second attempt meaningful; elsewhere it is handled by escalation.
    #[must_use]
    pub fn for_tier(tier: Tier, settings: &RetrySettings) -> Self {
        let mut retryable = vec![ErrorCategory::NetworkError, ErrorCategory::Timeout];
        if tier.is_bypass() {
            retryable.push(ErrorCategory::BotDetection);
        }
        Self::new(*settings, retryable)
    }

    #[must_use]
    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    #[must_use]
    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        self.retryable.contains(&category)
    }

    /// Backoff before retry number `retry` (1 for the first retry), without
    /// jitter: `base_delay * 2^(retry - 1)`, capped at [`MAX_RETRY_DELAY`].
    #[must_use]
    pub fn base_backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.settings
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_RETRY_DELAY)
    }

    fn backoff_with_jitter(&self, retry: u32) -> Duration {
        let delay = self.base_backoff(retry);
        let max_jitter = delay.as_secs_f64() * self.settings.jitter_ratio;
        if max_jitter <= 0.0 {
            return delay;
        }
        let jitter = rand::rng().random_range(0.0..=max_jitter);
        delay + Duration::from_secs_f64(jitter)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent. The last error is returned on
    /// exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the final [`ScrapeError`] produced by `operation`.
    pub async fn retry<T, F, Fut>(&self, mut operation: F) -> Result<T, ScrapeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScrapeError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let category = err.category();
            if !self.is_retryable(category) || attempt >= max_attempts {
                return Err(err);
            }

            let delay = self.backoff_with_jitter(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                category = %category,
                error = %err,
                "transient extraction error, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
