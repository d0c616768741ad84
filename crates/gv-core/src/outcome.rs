//! Expected-vs-observed HTTP outcome comparison.
//!
//! Pure comparison: no I/O, no logging, and the observed body is only
//! borrowed. The probe that produced the response owns and drops it.

use std::fmt::Write as _;

const BODY_PREVIEW_CHARS: usize = 256;

/// What a probe observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ObservedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Constraint on the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyExpectation {
    Equals(String),
    Contains(String),
}

impl BodyExpectation {
    fn accepts(&self, body: &str) -> bool {
        match self {
            Self::Equals(expected) => body == expected,
            Self::Contains(fragment) => body.contains(fragment.as_str()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Equals(expected) => format!("equal to {:?}", preview(expected)),
            Self::Contains(fragment) => format!("containing {:?}", preview(fragment)),
        }
    }
}

/// Immutable description of the desired result. Unspecified fields are not compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedOutcome {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<BodyExpectation>,
}

impl ExpectedOutcome {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: BodyExpectation) -> Self {
        self.body = Some(body);
        self
    }

    pub fn expected_status(&self) -> u16 {
        self.status
    }

    pub fn expected_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn expected_body(&self) -> Option<&BodyExpectation> {
        self.body.as_ref()
    }
}

/// Outcome of one comparison. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub diagnostic: String,
}

/// Compare `actual` against every field `expected` specifies.
///
/// The diagnostic lists expected and actual values for each compared field
/// so a mismatch can be diagnosed without re-running.
pub fn match_outcome(actual: &ObservedResponse, expected: &ExpectedOutcome) -> MatchResult {
    let mut fields = Vec::new();
    let mut matched = true;

    let status_ok = actual.status == expected.status;
    matched &= status_ok;
    fields.push(field_line(
        "status",
        &expected.status.to_string(),
        &actual.status.to_string(),
        status_ok,
    ));

    for (name, value) in &expected.headers {
        let observed = actual.header(name);
        let header_ok = observed == Some(value.as_str());
        matched &= header_ok;
        let observed = observed.map_or_else(|| "<absent>".to_string(), |v| format!("{v:?}"));
        fields.push(field_line(
            &format!("header {name:?}"),
            &format!("{value:?}"),
            &observed,
            header_ok,
        ));
    }

    if let Some(body) = &expected.body {
        let body_ok = body.accepts(&actual.body);
        matched &= body_ok;
        fields.push(field_line(
            "body",
            &body.describe(),
            &format!("{:?}", preview(&actual.body)),
            body_ok,
        ));
    }

    let mut diagnostic = String::from(if matched {
        "response matched"
    } else {
        "response did not match"
    });
    for line in fields {
        let _ = write!(diagnostic, "; {line}");
    }

    MatchResult {
        matched,
        diagnostic,
    }
}

fn field_line(field: &str, expected: &str, actual: &str, ok: bool) -> String {
    let verdict = if ok { "ok" } else { "MISMATCH" };
    format!("{field}: expected {expected}, actual {actual} [{verdict}]")
}

fn preview(text: &str) -> String {
    if text.chars().count() <= BODY_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
    format!("{head}...")
}
