//! Retry with exponential backoff and jitter for store calls.

use super::context::CallContext;
use crate::error::{GeoError, Result};
use crate::storage::StoreResult;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff.
///
/// Retry `n` (0-based) waits a uniformly random duration in
/// `[0, min(base * 2^n, max_backoff)]` (full jitter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryPolicy::default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "RetryPolicy::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    const fn default_max_attempts() -> u32 {
        5
    }

    const fn default_base_backoff_ms() -> u64 {
        25
    }

    const fn default_max_backoff_ms() -> u64 {
        2_000
    }

    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff_ms: base_backoff.as_millis() as u64,
            max_backoff_ms: Self::default_max_backoff_ms().max(base_backoff.as_millis() as u64),
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff_ms = max_backoff.as_millis() as u64;
        self
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Upper bound of the wait before retry `retry` (0-based).
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.min(63)).unwrap_or(u64::MAX);
        let millis = self
            .base_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Jittered wait before retry `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry).as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(GeoError::InvalidConfig(
                "retry max_attempts must be at least 1".into(),
            ));
        }
        if self.max_backoff_ms < self.base_backoff_ms {
            return Err(GeoError::InvalidConfig(format!(
                "retry max_backoff_ms ({}) must be >= base_backoff_ms ({})",
                self.max_backoff_ms, self.base_backoff_ms
            )));
        }
        Ok(())
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Retry state lives on this stack frame; nothing is shared between
    /// calls. A result returned after the context's deadline is discarded.
    pub(crate) fn run<T>(
        &self,
        ctx: &CallContext,
        operation: &str,
        mut call: impl FnMut() -> StoreResult<T>,
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            ctx.check()?;
            attempt += 1;

            match call() {
                Ok(value) => {
                    ctx.check()?;
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    log::debug!("{} rejected by store: {}", operation, e);
                    return Err(GeoError::StoreRejected(e));
                }
                Err(e) if attempt >= self.max_attempts => {
                    log::warn!(
                        "{} failed after {} attempt(s), giving up: {}",
                        operation,
                        attempt,
                        e
                    );
                    return Err(GeoError::StoreUnavailable {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt - 1);
                    log::debug!(
                        "{} attempt {}/{} failed ({}), retrying in {:?}",
                        operation,
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    ctx.sleep(delay)?;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_backoff_ms: Self::default_base_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
        }
    }
}
