//! Short back-to-back probe bursts for fixed-window rate limiters.
//!
//! Rate limiters that reset on clock-aligned windows make single-shot
//! assertions flaky when a check straddles a window boundary, and long loops
//! are likely to cross one. A burst of `N` probes is long enough to push the
//! limiter into its limited state and confirm the state persists, and short
//! enough to very likely finish inside one window. `N` is tuned to the
//! limiter's window length; if that changes, `N` must be re-derived.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::retry::{AttemptError, PolicyError, RetryError, RetryPolicy, retry_until};

/// Burst size used when none is configured: one probe to establish state,
/// two to confirm it.
pub const DEFAULT_BURST_SIZE: u32 = 3;

/// Number of probes issued per burst. Fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBudget(u32);

impl WindowBudget {
    /// Smallest burst that both trips the limiter and confirms it stays tripped.
    pub const MIN: u32 = 2;

    pub fn new(size: u32) -> Result<Self, PolicyError> {
        if size < Self::MIN {
            return Err(PolicyError::BurstTooSmall {
                size,
                min: Self::MIN,
            });
        }
        Ok(Self(size))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// One descriptor per probe in the burst, in issue order.
    pub fn attempts(self) -> impl Iterator<Item = BurstAttempt> {
        let size = self.0;
        (0..size).map(move |index| BurstAttempt { index, size })
    }
}

impl Default for WindowBudget {
    fn default() -> Self {
        Self(DEFAULT_BURST_SIZE)
    }
}

/// Position of one probe inside a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstAttempt {
    pub index: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("burst probe {} of {} failed: {failure}", .attempt.index + 1, .attempt.size)]
pub struct BurstError<E> {
    pub attempt: BurstAttempt,
    pub failure: RetryError<E>,
}

/// Run every probe of the burst in sequence, each retried independently
/// under `policy`. The first probe that cannot be made to succeed fails the
/// whole burst.
pub async fn verify_burst<T, E, F, Fut>(
    budget: WindowBudget,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<Vec<T>, BurstError<E>>
where
    F: FnMut(BurstAttempt) -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    let mut results = Vec::with_capacity(budget.get() as usize);
    for burst_attempt in budget.attempts() {
        let value = retry_until(policy, cancel, || attempt(burst_attempt))
            .await
            .map_err(|failure| BurstError {
                attempt: burst_attempt,
                failure,
            })?;
        results.push(value);
    }
    Ok(results)
}
