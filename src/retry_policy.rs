//! Retry policy for calls to remote services.
//!
//! Implements exponential backoff with configurable parameters. Rate-limited
//! responses wait for the server-provided delay plus a margin instead.

use crate::config::RetrySettings;
use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// Error classification needed to decide whether a failed call is retried.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;

    /// Server-requested delay before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up.
    pub max_retries: u32,
    /// Initial backoff duration in seconds.
    pub initial_backoff_secs: u64,
    /// Maximum backoff duration in seconds (cap for exponential growth).
    pub max_backoff_secs: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
    /// Extra seconds waited on top of a server-provided delay.
    pub rate_limit_margin_secs: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetrySettings) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_secs: config.initial_backoff_secs,
            max_backoff_secs: config.max_backoff_secs,
            backoff_multiplier: config.backoff_multiplier,
            rate_limit_margin_secs: config.rate_limit_margin_secs,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns true if the error type is retryable and the budget is not spent.
    pub fn should_retry<E: RetryableError>(&self, error: &E, retry_count: u32) -> bool {
        error.is_retryable() && retry_count < self.max_retries
    }

    /// Backoff duration in seconds for a given retry count.
    ///
    /// `initial_backoff * multiplier^retry_count`, capped at `max_backoff_secs`.
    pub fn backoff_secs(&self, retry_count: u32) -> u64 {
        let backoff =
            self.initial_backoff_secs as f64 * self.backoff_multiplier.powi(retry_count as i32);
        (backoff.min(self.max_backoff_secs as f64)) as u64
    }

    /// How long to wait before retrying after `error`.
    pub fn delay_for<E: RetryableError>(&self, error: &E, retry_count: u32) -> Duration {
        match error.retry_after() {
            Some(server_delay) => server_delay + Duration::from_secs(self.rate_limit_margin_secs),
            None => Duration::from_secs(self.backoff_secs(retry_count)),
        }
    }

    /// Runs `op` until it succeeds, fails permanently or the retry budget is spent.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: RetryableError + Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut retry_count = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, retry_count) => {
                    let delay = self.delay_for(&err, retry_count);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        err,
                        retry_count + 1,
                        self.max_retries,
                        delay
                    );
                    std::thread::sleep(delay);
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}
