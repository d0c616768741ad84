use std::fmt::Write as _;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

impl ScenarioStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    /// Last failure diagnostic, verbatim, or why the scenario was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
}

impl ScenarioReport {
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, ScenarioStatus::Passed, duration, None)
    }

    pub fn failed(name: impl Into<String>, duration: Duration, diagnostic: String) -> Self {
        Self::new(name, ScenarioStatus::Failed, duration, Some(diagnostic))
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            name,
            ScenarioStatus::Skipped,
            Duration::ZERO,
            Some(reason.into()),
        )
    }

    fn new(
        name: impl Into<String>,
        status: ScenarioStatus,
        duration: Duration,
        diagnostic: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            diagnostic,
            cleanup_error: None,
        }
    }

    /// A cleanup failure fails an otherwise passing scenario.
    pub fn with_cleanup_error(mut self, error: String) -> Self {
        if self.status == ScenarioStatus::Passed {
            self.status = ScenarioStatus::Failed;
        }
        self.cleanup_error = Some(error);
        self
    }
}

/// Outcome of one `gv run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Ulid,
    pub suite: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
    pub cancelled: bool,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn start(suite: impl Into<String>) -> Self {
        Self {
            run_id: Ulid::new(),
            suite: suite.into(),
            started_at: Utc::now(),
            finished_at: None,
            setup_error: None,
            teardown_error: None,
            cancelled: false,
            scenarios: Vec::new(),
        }
    }

    pub fn record(&mut self, scenario: ScenarioReport) {
        self.scenarios.push(scenario);
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    /// Every selected scenario ran and passed, and teardown succeeded.
    pub fn passed(&self) -> bool {
        self.setup_error.is_none()
            && self.teardown_error.is_none()
            && !self.cancelled
            && self
                .scenarios
                .iter()
                .all(|s| s.status == ScenarioStatus::Passed)
    }

    /// `0` all passed, `2` suite setup failed, `1` anything else went wrong.
    pub fn exit_code(&self) -> i32 {
        if self.setup_error.is_some() {
            2
        } else if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run {} of suite '{}' (started {})",
            self.run_id,
            self.suite,
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        if let Some(error) = &self.setup_error {
            let _ = writeln!(out, "SETUP FAILED: {error}");
        }
        for scenario in &self.scenarios {
            let _ = writeln!(
                out,
                "{}  {} ({:.1}s)",
                scenario.status.label(),
                scenario.name,
                scenario.duration_ms as f64 / 1000.0
            );
            if let Some(diagnostic) = &scenario.diagnostic {
                let _ = writeln!(out, "      {diagnostic}");
            }
            if let Some(error) = &scenario.cleanup_error {
                let _ = writeln!(out, "      cleanup: {error}");
            }
        }
        if let Some(error) = &self.teardown_error {
            let _ = writeln!(out, "TEARDOWN FAILED: {error}");
        }
        if self.cancelled {
            let _ = writeln!(out, "Run was cancelled");
        }
        let _ = writeln!(
            out,
            "{} passed, {} failed, {} skipped",
            self.count(ScenarioStatus::Passed),
            self.count(ScenarioStatus::Failed),
            self.count(ScenarioStatus::Skipped)
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(scenarios: Vec<ScenarioReport>) -> RunReport {
        let mut report = RunReport::start("global-rate-limit");
        for scenario in scenarios {
            report.record(scenario);
        }
        report.finish(false);
        report
    }

    #[test]
    fn test_all_passed_exits_zero() {
        let report = report_with(vec![
            ScenarioReport::passed("by-remote-address", Duration::from_millis(1200)),
            ScenarioReport::passed("by-path", Duration::from_millis(800)),
        ]);
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_failure_exits_one_and_keeps_diagnostic() {
        let diagnostic =
            "step 2 (burst): GET http://10.0.0.7/path1 (host example.com): burst probe 2 of 3 failed"
                .to_string();
        let report = report_with(vec![
            ScenarioReport::passed("by-remote-address", Duration::from_secs(1)),
            ScenarioReport::failed("by-path", Duration::from_secs(60), diagnostic.clone()),
        ]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.scenarios[1].diagnostic.as_deref(), Some(diagnostic.as_str()));

        let text = report.render_text();
        assert!(text.contains("PASS  by-remote-address (1.0s)"), "{text}");
        assert!(text.contains("FAIL  by-path (60.0s)"), "{text}");
        assert!(text.contains(&format!("      {diagnostic}")), "{text}");
        assert!(text.ends_with("1 passed, 1 failed, 0 skipped\n"), "{text}");
    }

    #[test]
    fn test_setup_failure_exits_two() {
        let mut report = report_with(vec![ScenarioReport::skipped(
            "by-remote-address",
            "suite setup failed",
        )]);
        report.setup_error = Some("waiting for pods to be Running".to_string());
        assert_eq!(report.exit_code(), 2);
        assert!(report.render_text().contains("SETUP FAILED: waiting for pods"));
    }

    #[test]
    fn test_cleanup_error_fails_passing_scenario() {
        let scenario = ScenarioReport::passed("by-user-id", Duration::from_secs(2))
            .with_cleanup_error("failed to delete scenario manifests".to_string());
        assert_eq!(scenario.status, ScenarioStatus::Failed);
        assert_eq!(scenario.diagnostic, None);
        assert_eq!(report_with(vec![scenario]).exit_code(), 1);
    }

    #[test]
    fn test_cancelled_run_does_not_pass() {
        let mut report = report_with(vec![ScenarioReport::passed("a", Duration::ZERO)]);
        report.finish(true);
        assert!(!report.passed());
        assert!(report.render_text().contains("Run was cancelled"));
    }

    #[test]
    fn test_json_shape() {
        let report = report_with(vec![
            ScenarioReport::passed("by-remote-address", Duration::from_millis(1500)),
            ScenarioReport::skipped("by-path", "run cancelled"),
        ]);
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("serialize")).expect("parse");
        assert_eq!(json["suite"], "global-rate-limit");
        assert_eq!(json["run_id"].as_str().map(str::len), Some(26));
        assert_eq!(json["scenarios"][0]["status"], "passed");
        assert_eq!(json["scenarios"][0]["duration_ms"], 1500);
        assert!(json["scenarios"][0].get("diagnostic").is_none());
        assert_eq!(json["scenarios"][1]["status"], "skipped");
        assert_eq!(json["scenarios"][1]["diagnostic"], "run cancelled");
        assert!(json.get("setup_error").is_none());
    }
}
