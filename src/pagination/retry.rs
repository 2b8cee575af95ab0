//! Retry decisions for failed fetches
//!
//! The policy is the single authority on whether a failed request is tried
//! again. Rate limits are always waited out and never count against the
//! budget; transient failures are retried with backoff until the ceiling is
//! passed; fatal failures abort immediately.

use super::fetcher::FetchError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// What to do after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the duration, then retry the same cursor
    Wait(Duration),
    /// Give up on the run
    Abort,
}

/// Retry configuration with backoff strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Transient failures tolerated in a row before aborting
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Backoff strategy for transient failures
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Delay before the first transient retry
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound on a computed transient delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Add jitter to transient delays
    #[serde(default)]
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_retries: default_max_transient_retries(),
            backoff: BackoffStrategy::default(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
        }
    }
}

/// Backoff strategies for transient retry delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every time
    #[default]
    Fixed,
    /// Delay grows by `increment` per attempt
    Linear {
        #[serde(with = "humantime_serde")]
        increment: Duration,
    },
    /// Delay multiplies by `base` per attempt
    Exponential {
        #[serde(default = "default_exponential_base")]
        base: f64,
    },
}

/// Counters for the request currently being retried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Consecutive transient failures
    pub transient_attempts: u32,
    /// Rate-limit waits, for reporting only
    pub rate_limited_waits: u32,
}

impl RetryState {
    /// Called after a successful request
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl RetryPolicy {
    /// A policy with no transient delay, mostly useful in tests
    pub fn immediate(max_transient_retries: u32) -> Self {
        Self {
            max_transient_retries,
            initial_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Decide how to react to `error`, updating `state`
    pub fn decide(&self, error: &FetchError, state: &mut RetryState) -> RetryDecision {
        match error {
            FetchError::RateLimited { retry_after } => {
                state.rate_limited_waits += 1;
                debug!(
                    wait_ms = retry_after.as_millis() as u64,
                    waits = state.rate_limited_waits,
                    "Rate limited"
                );
                RetryDecision::Wait(*retry_after)
            }
            FetchError::Transient(cause) => {
                state.transient_attempts += 1;
                if state.transient_attempts > self.max_transient_retries {
                    warn!(
                        "Giving up after {} transient failures: {}",
                        state.transient_attempts, cause
                    );
                    return RetryDecision::Abort;
                }
                let delay = self.apply_jitter(self.calculate_delay(state.transient_attempts));
                debug!(
                    attempt = state.transient_attempts,
                    max = self.max_transient_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure: {}",
                    cause
                );
                RetryDecision::Wait(delay)
            }
            FetchError::Fatal(_) => RetryDecision::Abort,
        }
    }

    /// Calculate the transient delay for the given attempt (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let base_delay = match &self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear { increment } => {
                self.initial_delay + increment.saturating_mul(attempt - 1)
            }
            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(attempt as i32 - 1);
                let secs = self.initial_delay.as_secs_f64() * multiplier;
                if secs.is_finite() {
                    Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
                } else {
                    self.max_delay
                }
            }
        };

        base_delay.min(self.max_delay)
    }

    /// Run `operation` until it succeeds or the policy gives up
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut state = RetryState::default();
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            match self.decide(&err, &mut state) {
                RetryDecision::Wait(wait) => tokio::time::sleep(wait).await,
                RetryDecision::Abort => return Err(err),
            }
        }
    }

    /// Apply jitter to delay
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.jitter_factor;
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }
}

// Default functions for serde
fn default_max_transient_retries() -> u32 {
    100
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_jitter_factor() -> f64 {
    0.3
}

fn default_exponential_base() -> f64 {
    2.0
}
