//! Retry configuration, delay calculation, and the shared retry loop.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and
//! [`with_retry()`], the one place backend invocations are retried. The
//! loop consults only [`DraupnirError::is_transient()`], never the error
//! text.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::cancel::CancellationToken;
use crate::telemetry;
use crate::{DraupnirError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// Uses linear backoff: the n-th retry waits `retry_delay * n`.
///
/// ```rust
/// # use draupnir::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .retry_attempts(5)
///     .retry_delay(Duration::from_millis(200))
///     .timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial invocation. 0 = no retry. Default: 3.
    pub retry_attempts: u32,
    /// Base delay; multiplied by the retry number. Default: 1s.
    pub retry_delay: Duration,
    /// Upper bound for a single backoff delay. Default: 30s.
    pub max_delay: Duration,
    /// Timeout for each individual invocation. Default: 60s.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            retry_attempts: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries after the initial invocation.
    pub fn retry_attempts(mut self, n: u32) -> Self {
        self.retry_attempts = n;
        self
    }

    /// Set the base backoff delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the maximum backoff delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the per-invocation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Total invocations allowed: the initial one plus retries.
    pub fn max_invocations(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): `retry_delay * retry`,
    /// capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.retry_delay.saturating_mul(retry).min(self.max_delay)
    }

    /// Effective delay, respecting backend `retry_after` hints.
    pub fn effective_delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|d| d.min(self.max_delay))
            .unwrap_or_else(|| self.delay_for_retry(retry))
    }
}

/// Value produced by [`with_retry()`] with the number of invocations made.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Execute an async operation with retry logic.
///
/// Each invocation is bounded by `config.timeout`; an elapsed timeout is a
/// transient error. Transient errors are retried up to
/// `config.retry_attempts` times with linear backoff. Permanent errors are
/// returned immediately. The token is checked before every invocation and
/// raced against each backoff sleep; an invocation already in flight is
/// allowed to finish.
///
/// Exhausted retries yield `RetriesExhausted` carrying the last error text.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    backend_name: &str,
    f: F,
) -> Result<Retried<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max = config.max_invocations();
    let mut last_err = None;

    for attempt in 1..=max {
        cancel.check()?;
        metrics::counter!(telemetry::BACKEND_INVOCATIONS_TOTAL,
            "backend" => backend_name.to_owned(),
        )
        .increment(1);

        let outcome = match tokio::time::timeout(config.timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(DraupnirError::Timeout(config.timeout)),
        };

        match outcome {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) if e.is_transient() => {
                if attempt < max {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        backend = backend_name,
                        attempt,
                        max_attempts = max,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "backend" => backend_name.to_owned(),
                    )
                    .increment(1);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(DraupnirError::Cancelled),
                    }
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }

    Err(DraupnirError::RetriesExhausted {
        attempts: max,
        last_error: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string()),
    })
}
