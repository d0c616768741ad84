//! Root-cause classification for connection-level failures.
//!
//! Transport errors arrive as a chain of wrapped causes, e.g. request error
//! -> network error -> OS error -> numeric errno. Scenarios that expect a
//! connection failure compare only the innermost cause against an expected
//! description, so the chain is walked through the explicit [`Cause`]
//! capability rather than any particular error-representation convention.

use std::collections::HashSet;
use std::fmt;
use std::io;

/// An error-like value exposing at most one inner cause.
pub trait Cause: fmt::Display + fmt::Debug {
    fn cause(&self) -> Option<&dyn Cause>;
}

/// Return the innermost cause of `err`, or `err` itself when it wraps nothing.
///
/// Chains of any depth are walked to the end. A malformed chain that loops
/// back on itself stops at the last layer not yet visited.
pub fn root_cause(err: &dyn Cause) -> &dyn Cause {
    let mut visited = HashSet::new();
    let mut current = err;
    visited.insert(layer_addr(current));
    while let Some(inner) = current.cause() {
        if !visited.insert(layer_addr(inner)) {
            break;
        }
        current = inner;
    }
    current
}

fn layer_addr(layer: &dyn Cause) -> *const () {
    layer as *const dyn Cause as *const ()
}

/// Root-cause description a curl client reports for well-known exit codes.
///
/// Lets a suite state an expected connection failure as a curl exit code.
pub fn curl_exit_description(code: i32) -> Option<&'static str> {
    match code {
        7 => Some("connection refused"),
        56 => Some("connection reset by peer"),
        _ => None,
    }
}

/// Owned, immutable snapshot of a transport failure and its causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
    os_code: Option<i32>,
    inner: Option<Box<TransportError>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            os_code: None,
            inner: None,
        }
    }

    /// Wrap `inner` in a new outer layer.
    pub fn wrapping(message: impl Into<String>, inner: TransportError) -> Self {
        Self {
            message: message.into(),
            os_code: None,
            inner: Some(Box::new(inner)),
        }
    }

    /// Errno node, described the way the OS names the failure (lower case).
    pub fn os(code: i32) -> Self {
        Self {
            message: os_description(code),
            os_code: Some(code),
            inner: None,
        }
    }

    /// Snapshot a live `source()` chain.
    ///
    /// When the innermost link is an `io::Error` carrying an OS code, an errno
    /// node is appended so the root reads e.g. `connection reset by peer`.
    pub fn capture(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut layers = Vec::new();
        let mut next = Some(err);
        let mut trailing_code = None;
        let mut visited = HashSet::new();
        while let Some(current) = next {
            if !visited.insert(current as *const dyn std::error::Error as *const ()) {
                break;
            }
            layers.push(current.to_string());
            trailing_code = current
                .downcast_ref::<io::Error>()
                .and_then(io::Error::raw_os_error);
            next = current.source();
        }

        let mut chain = trailing_code.map(TransportError::os);
        for message in layers.into_iter().rev() {
            chain = Some(match chain {
                Some(inner) => TransportError::wrapping(message, inner),
                None => TransportError::new(message),
            });
        }
        chain.unwrap_or_else(|| TransportError::new(err.to_string()))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn os_code(&self) -> Option<i32> {
        self.os_code
    }

    /// Iterate from this layer down to the root.
    pub fn chain(&self) -> impl Iterator<Item = &TransportError> {
        std::iter::successors(Some(self), |layer| layer.inner.as_deref())
    }

    /// The innermost layer's description.
    pub fn root_description(&self) -> String {
        root_cause(self).to_string()
    }

    /// Every layer joined with `: `, outermost first.
    pub fn describe_chain(&self) -> String {
        self.chain()
            .map(TransportError::message)
            .collect::<Vec<_>>()
            .join(": ")
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .as_deref()
            .map(|inner| inner as &(dyn std::error::Error + 'static))
    }
}

impl Cause for TransportError {
    fn cause(&self) -> Option<&dyn Cause> {
        self.inner.as_deref().map(|inner| inner as &dyn Cause)
    }
}

fn os_description(code: i32) -> String {
    let text = io::Error::from_raw_os_error(code).to_string();
    let suffix = format!(" (os error {code})");
    let text = text.strip_suffix(suffix.as_str()).unwrap_or(&text);
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => format!("os error {code}"),
    }
}
