//! Per-call cancellation and deadlines.

use crate::error::{GeoError, Result};
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between a caller and the work it spawns.
///
/// Cancelling a token cancels every child derived from it; cancelling a
/// child leaves the parent untouched. Work checks the token between store
/// calls and while backing off; nothing is interrupted forcibly. None of
/// this needs an async runtime.
///
/// # Examples
///
/// ```rust
/// use geokv::CancellationToken;
///
/// let parent = CancellationToken::new();
/// let child = parent.child_token();
///
/// child.cancel();
/// assert!(!parent.is_cancelled());
///
/// let other = parent.child_token();
/// parent.cancel();
/// assert!(other.is_cancelled());
/// ```
pub use tokio_util::sync::CancellationToken;

/// Longest stretch a sleeping call goes without looking at its token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cancellation token plus optional deadline for one store-facing call.
#[derive(Debug, Clone)]
pub struct CallContext {
    token: CancellationToken,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Starts the deadline clock now.
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// No deadline and a token nobody else holds.
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the call was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(GeoError::Cancelled);
        }
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.timeout)
            && Instant::now() > deadline
        {
            return Err(GeoError::ScanTimeout(timeout));
        }
        Ok(())
    }

    /// Sleep for `delay` unless cancelled first. A sleep that would outlast
    /// the deadline fails right away with `ScanTimeout`.
    pub fn sleep(&self, delay: Duration) -> Result<()> {
        if let (Some(deadline), Some(timeout)) = (self.deadline, self.timeout)
            && Instant::now() + delay > deadline
        {
            return Err(GeoError::ScanTimeout(timeout));
        }
        let until = Instant::now() + delay;
        loop {
            if self.token.is_cancelled() {
                return Err(GeoError::Cancelled);
            }
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep((until - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}
