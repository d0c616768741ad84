use anyhow::{Context, Result};
use gv_core::{BodyExpectation, ExpectedOutcome, HttpMethod, NamespacedName, ProbeRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A verification suite: shared fixtures, the gateway under test, and the
/// scenarios to run against it (`suite.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub name: String,
    /// Leave fixtures in place after the run for post-mortem inspection.
    #[serde(default)]
    pub skip_cleanup: bool,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub burst: BurstConfig,
    #[serde(default)]
    pub kubectl: KubectlConfig,
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
    /// Directory relative manifest paths were resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub name: String,
    pub namespace: String,
    /// Port appended to the resolved address when the gateway does not listen on 80.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Fixed address; skips endpoint resolution (e.g. a port-forward).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GatewayConfig {
    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(&self.namespace, &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Per-probe retry budget.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Budget for fixtures to appear, pods to run, and the gateway to report an address.
    #[serde(default = "default_fixture_timeout_secs")]
    pub fixture_timeout_secs: u64,
    #[serde(default = "default_fixture_interval_ms")]
    pub fixture_interval_ms: u64,
    /// Timeout of one HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
            probe_interval_ms: default_probe_interval_ms(),
            fixture_timeout_secs: default_fixture_timeout_secs(),
            fixture_interval_ms: default_fixture_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TimingConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn fixture_timeout(&self) -> Duration {
        Duration::from_secs(self.fixture_timeout_secs)
    }

    pub fn fixture_interval(&self) -> Duration {
        Duration::from_millis(self.fixture_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_probe_interval_ms() -> u64 {
    500
}

fn default_fixture_timeout_secs() -> u64 {
    120
}

fn default_fixture_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Probes per burst; tuned to the rate limiter's window length.
    #[serde(default = "default_burst_size")]
    pub size: u32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            size: default_burst_size(),
        }
    }
}

fn default_burst_size() -> u32 {
    gv_core::DEFAULT_BURST_SIZE
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubectlConfig {
    /// Explicit kubectl binary; looked up on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
}

/// Control-plane object reference as written in the suite file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodConfig {
    pub namespace: String,
    /// Label selector, e.g. `app=ratelimit`.
    pub selector: String,
    /// Pods created by the suite's own manifests; awaited gone at teardown.
    #[serde(default)]
    pub owned: bool,
}

/// Fixtures set up once before any scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Applied at setup, deleted at teardown.
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
    /// Objects created by `manifests`.
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    /// Pre-installed objects that must exist; never deleted.
    #[serde(default)]
    pub verify: Vec<ObjectConfig>,
    #[serde(default)]
    pub pods: Vec<PodConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// The request half of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub path: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Host header, e.g. `example.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl RequestConfig {
    /// Build the probe request against `address`.
    pub fn to_request(&self, address: &str) -> ProbeRequest {
        let mut request = ProbeRequest::new(address, &self.path).with_method(self.method);
        if let Some(host) = &self.host {
            request = request.with_host_header(host);
        }
        for (name, value) in &self.headers {
            request = request.with_header(name, value);
        }
        request
    }
}

/// The expectation half of a response step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectConfig {
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_contains: Option<String>,
}

impl ExpectConfig {
    pub fn to_expected(&self) -> ExpectedOutcome {
        let mut expected = ExpectedOutcome::status(self.status);
        for (name, value) in &self.response_headers {
            expected = expected.with_header(name, value);
        }
        if let Some(body) = &self.body_equals {
            expected = expected.with_body(BodyExpectation::Equals(body.clone()));
        } else if let Some(fragment) = &self.body_contains {
            expected = expected.with_body(BodyExpectation::Contains(fragment.clone()));
        }
        expected
    }
}

/// One assertion of a scenario. Steps run in the order written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepConfig {
    /// Single probe, retried until it matches.
    Expect {
        #[serde(flatten)]
        request: RequestConfig,
        #[serde(flatten)]
        expect: ExpectConfig,
    },
    /// `burst.size` probes back to back, each retried until it matches.
    Burst {
        #[serde(flatten)]
        request: RequestConfig,
        #[serde(flatten)]
        expect: ExpectConfig,
    },
    /// Connection-level failure, optionally with a specific root cause.
    ExpectError {
        #[serde(flatten)]
        request: RequestConfig,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        root_cause: Option<String>,
        /// Shorthand for `root_cause` using the curl exit code (e.g. 56).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        curl_exit_code: Option<i32>,
    },
}

impl StepConfig {
    pub fn request(&self) -> &RequestConfig {
        match self {
            Self::Expect { request, .. }
            | Self::Burst { request, .. }
            | Self::ExpectError { request, .. } => request,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expect { .. } => "expect",
            Self::Burst { .. } => "burst",
            Self::ExpectError { .. } => "expect-error",
        }
    }

    /// Root-cause text an `expect-error` step must observe, if any.
    pub fn expected_root_cause(&self) -> Option<String> {
        match self {
            Self::ExpectError {
                root_cause,
                curl_exit_code,
                ..
            } => root_cause.clone().or_else(|| {
                curl_exit_code
                    .and_then(gv_core::curl_exit_description)
                    .map(str::to_string)
            }),
            _ => None,
        }
    }
}

impl SuiteConfig {
    /// Load a suite file, resolving relative manifest paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite config: {}", path.display()))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml_str(&content, &base_dir)
            .with_context(|| format!("Failed to parse suite config: {}", path.display()))
    }

    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: SuiteConfig = toml::from_str(content)?;
        config.base_dir = base_dir.to_path_buf();
        config.resolve_paths();
        tracing::debug!(
            suite = %config.name,
            scenarios = config.scenarios.len(),
            "Loaded suite config"
        );
        Ok(config)
    }

    fn resolve_paths(&mut self) {
        let base = self.base_dir.clone();
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        self.shared.manifests.iter_mut().for_each(resolve);
        for scenario in &mut self.scenarios {
            scenario.manifests.iter_mut().for_each(resolve);
        }
        if let Some(kubeconfig) = self.kubectl.kubeconfig.as_mut() {
            resolve(kubeconfig);
        }
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.iter().find(|scenario| scenario.name == name)
    }

    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
