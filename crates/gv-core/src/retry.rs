//! Bounded-time polling.
//!
//! [`retry_until`] is a pure control loop over a caller-supplied attempt: it
//! performs no logging and holds no state outside its own stack frame, so
//! independent call sites may run it concurrently.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("retry max duration must be greater than zero")]
    ZeroDuration,

    #[error("retry poll interval must be greater than zero")]
    ZeroInterval,

    #[error("burst size {size} is below the minimum of {min}")]
    BurstTooSmall { size: u32, min: u32 },
}

/// How long to keep polling and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_duration: Duration,
    poll_interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_duration: Duration, poll_interval: Duration) -> Result<Self, PolicyError> {
        if max_duration.is_zero() {
            return Err(PolicyError::ZeroDuration);
        }
        if poll_interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        Ok(Self {
            max_duration,
            poll_interval,
        })
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// Worth another attempt after the poll interval.
    Transient(E),
    /// Retrying cannot change the result; stop now.
    Permanent(E),
}

impl<E> AttemptError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Transient(error) | Self::Permanent(error) => error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s) in {elapsed:?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: E,
    },

    #[error("attempt {attempts} failed permanently: {error}")]
    Aborted { attempts: u32, error: E },

    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E> RetryError<E> {
    /// The most recent attempt error, if any attempt ran.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Aborted { error, .. } => Some(error),
            Self::Cancelled { last, .. } => last.as_ref(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Invoke `attempt` until it succeeds, fails permanently, the policy's
/// duration elapses, or `cancel` fires.
///
/// Elapsed time is measured from the start of the first attempt. Between
/// attempts the loop sleeps for the poll interval, clipped to the remaining
/// budget, so an attempt that always fails instantly gives up within
/// `[max_duration, max_duration + poll_interval]`. On exhaustion the most
/// recent attempt error is returned.
pub async fn retry_until<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    let start = Instant::now();
    // `None` when the budget reaches past what the clock can represent.
    let deadline = start.checked_add(policy.max_duration);
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts, last });
        }

        attempts += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts, last }),
            outcome = attempt() => outcome,
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(AttemptError::Permanent(error)) => {
                return Err(RetryError::Aborted { attempts, error });
            }
            Err(AttemptError::Transient(error)) => error,
        };

        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            return Err(RetryError::Exhausted {
                attempts,
                elapsed: now - start,
                last: error,
            });
        }
        last = Some(error);

        let pause = match deadline {
            Some(deadline) => policy
                .poll_interval
                .min(deadline.saturating_duration_since(now)),
            None => policy.poll_interval,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts, last }),
            _ = sleep(pause) => {}
        }
    }
}
