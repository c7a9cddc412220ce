//! Classification-aware retry with capped exponential backoff.
//!
//! Every external call an agent makes goes through [`RetryExecutor::execute`].
//! The caller decides which errors are transient by supplying a classifier;
//! the executor only decides *when* to try again.

use crate::service::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Backoff policy for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based):
    /// `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Errors the executor can label in its log lines.
pub trait ErrorKind: Display {
    fn kind(&self) -> &'static str;
}

impl ErrorKind for ServiceError {
    fn kind(&self) -> &'static str {
        ServiceError::kind(self)
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the policy's retries are spent.
///
/// The error returned is always the one produced by the last attempt, never a
/// wrapper around it.
pub async fn retry_execution<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    is_retryable: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: ErrorKind,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(output) => {
                if attempt > 0 {
                    info!(
                        attempt = attempt + 1,
                        max_attempts, "Operation succeeded after retry"
                    );
                }
                return Ok(output);
            }
            Err(e) if !is_retryable(&e) => {
                error!(
                    error_kind = e.kind(),
                    error = %e,
                    "Operation failed with non-retryable error"
                );
                return Err(e);
            }
            Err(e) if attempt >= policy.max_retries => {
                error!(
                    attempts = attempt + 1,
                    error_kind = e.kind(),
                    error = %e,
                    "Operation failed, retries exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error_kind = e.kind(),
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// A [`RetryPolicy`] bound to call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// See [`retry_execution`].
    pub async fn execute<T, E, F, Fut, C>(&self, operation: F, is_retryable: C) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: ErrorKind,
    {
        retry_execution(&self.policy, is_retryable, operation).await
    }
}
