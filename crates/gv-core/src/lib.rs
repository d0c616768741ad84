//! Retry-driven assertion engine for verifying a live gateway.
//!
//! Leaves first:
//! - [`cause`]: root-cause classification of transport failures
//! - [`outcome`]: expected-vs-observed HTTP response matching
//! - [`retry`]: bounded-time polling with cancellation
//! - [`burst`]: back-to-back probe bursts sized to one rate-limit window
//! - [`assertion`]: the above composed over a [`Probe`]

pub mod assertion;
pub mod burst;
pub mod cause;
pub mod endpoint;
pub mod outcome;
pub mod probe;
pub mod retry;

pub use assertion::{AssertionError, AttemptFailure, Verifier};
pub use burst::{BurstAttempt, BurstError, DEFAULT_BURST_SIZE, WindowBudget, verify_burst};
pub use cause::{Cause, TransportError, curl_exit_description, root_cause};
pub use endpoint::{GatewayEndpoint, NamespacedName};
pub use outcome::{BodyExpectation, ExpectedOutcome, MatchResult, ObservedResponse, match_outcome};
pub use probe::{HttpMethod, Probe, ProbeRequest};
pub use retry::{AttemptError, PolicyError, RetryError, RetryPolicy, retry_until};
