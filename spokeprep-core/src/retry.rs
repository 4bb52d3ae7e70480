//! Bounded re-execution of fallible asynchronous operations.

use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;

use log::warn;

/// Re-runs an operation until it succeeds or the attempt budget is spent.
///
/// Attempts are immediate and strictly sequential. After the last attempt
/// the error it produced is returned exactly as the operation produced it.
/// Wrapped operations may be partially re-executed, so they must tolerate
/// running more than once.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::num::NonZeroU32;
/// use spokeprep_core::RetryPolicy;
///
/// let policy = RetryPolicy::new(NonZeroU32::new(3).expect("non-zero"));
/// let calls = Cell::new(0);
/// let outcome = tokio::runtime::Builder::new_current_thread()
///     .build()
///     .expect("runtime")
///     .block_on(policy.run("flaky operation", || {
///         calls.set(calls.get() + 1);
///         let attempt = calls.get();
///         async move { if attempt < 3 { Err("not yet") } else { Ok(attempt) } }
///     }));
/// assert_eq!(outcome, Ok(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` total attempts.
    pub const fn new(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts }
    }

    /// Policy that never retries.
    pub const fn once() -> Self {
        Self::new(NonZeroU32::MIN)
    }

    /// Total attempts, including the first.
    pub const fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Run `operation`, re-invoking it after each failure while attempts remain.
    ///
    /// `what` names the operation in log output only.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.max_attempts.get();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    warn!("{what} failed on attempt {attempt} of {max_attempts}: {err}");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl From<NonZeroU32> for RetryPolicy {
    fn from(max_attempts: NonZeroU32) -> Self {
        Self::new(max_attempts)
    }
}
