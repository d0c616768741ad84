//! Retry-driven assertions against a probe.
//!
//! Each helper composes the probe, the outcome matcher or root-cause
//! classifier, and the retry engine. Responses are dropped as soon as the
//! match decision is made.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::burst::{BurstError, WindowBudget, verify_burst};
use crate::cause::TransportError;
use crate::outcome::{ExpectedOutcome, match_outcome};
use crate::probe::{Probe, ProbeRequest};
use crate::retry::{AttemptError, RetryError, RetryPolicy, retry_until};

/// Why a single probe attempt did not satisfy its assertion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("match failed: {0}")]
    Mismatch(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("expected a connection-level error but received an HTTP {status} response")]
    UnexpectedSuccess { status: u16 },

    #[error(
        "connection error root cause {actual:?} does not match expected {expected:?} (full error: {full})"
    )]
    RootCauseMismatch {
        actual: String,
        expected: String,
        full: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssertionError {
    #[error("{request}: {failure}")]
    Probe {
        request: String,
        failure: RetryError<AttemptFailure>,
    },

    #[error("{request}: {failure}")]
    Burst {
        request: String,
        failure: BurstError<AttemptFailure>,
    },
}

impl AssertionError {
    /// The last attempt's failure, verbatim.
    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        match self {
            Self::Probe { failure, .. } => failure.last_error(),
            Self::Burst { failure, .. } => failure.failure.last_error(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Probe { failure, .. } => failure.is_cancelled(),
            Self::Burst { failure, .. } => failure.failure.is_cancelled(),
        }
    }
}

/// Assertions over one probe, one per-probe retry policy and one cancellation scope.
pub struct Verifier<'a> {
    probe: &'a dyn Probe,
    policy: RetryPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> Verifier<'a> {
    pub fn new(probe: &'a dyn Probe, policy: RetryPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            probe,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Retry `request` until the response matches `expected`.
    pub async fn expect_response(
        &self,
        request: &ProbeRequest,
        expected: &ExpectedOutcome,
    ) -> Result<(), AssertionError> {
        retry_until(&self.policy, self.cancel, || {
            attempt_response(self.probe, request, expected)
        })
        .await
        .map_err(|failure| AssertionError::Probe {
            request: request.to_string(),
            failure,
        })
    }

    /// Retry `request` until it fails at the connection level.
    ///
    /// When `expected_root` is set, the failure's root cause must read exactly
    /// that. Any HTTP response, whatever its status, aborts immediately.
    pub async fn expect_transport_failure(
        &self,
        request: &ProbeRequest,
        expected_root: Option<&str>,
    ) -> Result<TransportError, AssertionError> {
        retry_until(&self.policy, self.cancel, || {
            attempt_transport_failure(self.probe, request, expected_root)
        })
        .await
        .map_err(|failure| AssertionError::Probe {
            request: request.to_string(),
            failure,
        })
    }

    /// Issue `budget` probes back to back; every one must match `expected`.
    pub async fn expect_burst(
        &self,
        budget: WindowBudget,
        request: &ProbeRequest,
        expected: &ExpectedOutcome,
    ) -> Result<(), AssertionError> {
        verify_burst(budget, &self.policy, self.cancel, |attempt| {
            debug!(
                probe = attempt.index + 1,
                of = attempt.size,
                %request,
                "burst probe"
            );
            attempt_response(self.probe, request, expected)
        })
        .await
        .map(|_| ())
        .map_err(|failure| AssertionError::Burst {
            request: request.to_string(),
            failure,
        })
    }
}

async fn attempt_response(
    probe: &dyn Probe,
    request: &ProbeRequest,
    expected: &ExpectedOutcome,
) -> Result<(), AttemptError<AttemptFailure>> {
    let response = match probe.execute(request).await {
        Ok(response) => response,
        Err(err) => {
            debug!(%request, error = %err.describe_chain(), "probe transport failure");
            return Err(AttemptError::Transient(AttemptFailure::Transport(
                err.describe_chain(),
            )));
        }
    };
    let result = match_outcome(&response, expected);
    drop(response);

    if result.matched {
        Ok(())
    } else {
        debug!(%request, diagnostic = %result.diagnostic, "probe mismatch");
        Err(AttemptError::Transient(AttemptFailure::Mismatch(
            result.diagnostic,
        )))
    }
}

async fn attempt_transport_failure(
    probe: &dyn Probe,
    request: &ProbeRequest,
    expected_root: Option<&str>,
) -> Result<TransportError, AttemptError<AttemptFailure>> {
    let err = match probe.execute(request).await {
        Ok(response) => {
            let status = response.status;
            drop(response);
            return Err(AttemptError::Permanent(AttemptFailure::UnexpectedSuccess {
                status,
            }));
        }
        Err(err) => err,
    };

    if let Some(expected) = expected_root {
        let actual = err.root_description();
        if actual != expected {
            debug!(%request, %actual, %expected, "root cause mismatch");
            return Err(AttemptError::Transient(AttemptFailure::RootCauseMismatch {
                actual,
                expected: expected.to_string(),
                full: err.describe_chain(),
            }));
        }
    }
    Ok(err)
}
