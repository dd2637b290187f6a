//! Bounded retry with exponential backoff.
//!
//! Every failure is treated as transient: the work is attempted up to
//! `total_attempts` times, sleeping between attempts with a delay that starts
//! at `base_delay` and doubles after each failure. There is no jitter and no
//! cap. The error from the last attempt is returned unchanged.
//!
//! Sleeping blocks the calling thread.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// How many times to attempt a remote call and how long to wait at first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    total_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if either argument is zero.
    pub fn new(total_attempts: u32, base_delay_ms: u64) -> Result<Self> {
        if total_attempts == 0 {
            return Err(Error::precondition("total attempts must be at least 1"));
        }
        if base_delay_ms == 0 {
            return Err(Error::precondition("base retry delay must be positive"));
        }
        Ok(Self {
            total_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        })
    }

    /// Number of attempts, including the first.
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total_attempts: crate::config::DEFAULT_TOTAL_ATTEMPTS,
            base_delay: Duration::from_millis(crate::config::DEFAULT_BASE_RETRY_INTERVAL_MS),
        }
    }
}

/// Something that can pause the calling thread.
pub trait Sleeper: Send + Sync {
    /// Block for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Sleeps with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Runs units of work under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Retrier {
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier").finish_non_exhaustive()
    }
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(Arc::new(ThreadSleeper))
    }
}

impl Retrier {
    /// Create a retrier that waits with the given sleeper.
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Attempt `work` until it succeeds or the policy's attempts run out.
    ///
    /// `operation` names the work in log output.
    pub fn invoke<T, E, F>(&self, operation: &str, policy: RetryPolicy, mut work: F) -> std::result::Result<T, E>
    where
        E: StdError + 'static,
        F: FnMut() -> std::result::Result<T, E>,
    {
        let mut delay = policy.base_delay;
        let mut attempt = 1;

        loop {
            match work() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= policy.total_attempts => {
                    error!(
                        operation,
                        attempt,
                        error = %cause_chain(&e),
                        "Giving up after final attempt"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        operation,
                        attempt,
                        total_attempts = policy.total_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %cause_chain(&e),
                        "Attempt failed, retrying"
                    );
                    self.sleeper.sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}

/// Render an error and all of its sources as one line.
pub fn cause_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
