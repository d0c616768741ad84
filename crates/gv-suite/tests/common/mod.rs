//! In-process stand-ins for the cluster and the gateway.
//!
//! Applying a manifest in the fake cluster switches on whatever it describes
//! (routes, a rate-limit policy, the rate-limit server's pods); the fake
//! gateway answers probes from that shared state.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, bail};
use async_trait::async_trait;
use gv_cluster::{EndpointResolver, ManifestDeployer, ObjectRef, PodSelector, ResourcePoller};
use gv_config::SuiteConfig;
use gv_core::{NamespacedName, ObservedResponse, Probe, ProbeRequest, TransportError};

pub const GATEWAY_NS: &str = "agentgateway-base";
pub const EXTENSIONS_NS: &str = "kgateway-test-extensions";
pub const GATEWAY_ADDRESS: &str = "172.18.0.10";

/// What a rate-limit policy counts requests by.
#[derive(Debug, Clone)]
pub enum Descriptor {
    RemoteAddress,
    /// Only requests to this exact path are counted.
    Path(&'static str),
    /// Requests without the header are not counted.
    Header(&'static str),
}

#[derive(Debug, Clone)]
pub struct Limit {
    pub policy: &'static str,
    pub descriptor: Descriptor,
    pub requests_per_window: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub objects: Vec<ObjectRef>,
    pub routes: bool,
    pub limit: Option<Limit>,
    pub pods: Option<PodSelector>,
}

#[derive(Debug, Default)]
pub struct World {
    manifests: HashMap<String, Manifest>,
    applied: Vec<String>,
    present: HashSet<ObjectRef>,
    pods: HashMap<PodSelector, Vec<String>>,
    /// Owned pods: polls left before they report `Running`.
    starting: HashMap<PodSelector, u32>,
    /// Polls an owned pod stays `Pending` after its manifest is applied.
    pending_polls: u32,
    counters: HashMap<String, u32>,
    /// Requests answered 404 after routes are applied, before they take effect.
    route_warmup: u32,
    warmup_left: u32,
    pub calls: Vec<String>,
    pub requests: Vec<String>,
    pub gateway_address: Option<String>,
    pub gateway_down: bool,
    pub fail_delete: bool,
}

impl World {
    fn routes_active(&self) -> bool {
        self.applied.iter().any(|name| self.manifests[name].routes)
    }

    fn active_limits(&self) -> Vec<Limit> {
        self.applied
            .iter()
            .filter_map(|name| self.manifests[name].limit.clone())
            .collect()
    }

    fn apply(&mut self, name: &str) -> Result<()> {
        let Some(manifest) = self.manifests.get(name).cloned() else {
            bail!("error: the path \"{name}\" does not exist");
        };
        if !self.applied.iter().any(|applied| applied == name) {
            self.applied.push(name.to_string());
        }
        self.present.extend(manifest.objects);
        if manifest.routes {
            self.warmup_left = self.route_warmup;
        }
        if let Some(selector) = manifest.pods {
            self.starting.insert(selector, self.pending_polls);
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) {
        let Some(manifest) = self.manifests.get(name).cloned() else {
            return;
        };
        self.applied.retain(|applied| applied != name);
        for object in &manifest.objects {
            self.present.remove(object);
        }
        if let Some(limit) = manifest.limit {
            let prefix = format!("{}:", limit.policy);
            self.counters.retain(|key, _| !key.starts_with(&prefix));
        }
        if let Some(selector) = manifest.pods {
            self.starting.remove(&selector);
        }
    }

    fn phases(&mut self, selector: &PodSelector) -> Vec<String> {
        if let Some(left) = self.starting.get_mut(selector) {
            if *left > 0 {
                *left -= 1;
                return vec!["Pending".to_string()];
            }
            return vec!["Running".to_string()];
        }
        self.pods.get(selector).cloned().unwrap_or_default()
    }

    fn handle(&mut self, request: &ProbeRequest) -> Result<ObservedResponse, TransportError> {
        self.requests.push(format!("{} {}", request.method, request.path));
        if self.gateway_down {
            return Err(TransportError::wrapping(
                format!("error sending request for url ({})", request.url()),
                TransportError::wrapping(
                    "client error (Connect)",
                    TransportError::new("connection refused"),
                ),
            ));
        }
        if !self.routes_active() {
            return Ok(ObservedResponse::new(404).with_body("route not found"));
        }
        if self.warmup_left > 0 {
            self.warmup_left -= 1;
            return Ok(ObservedResponse::new(404).with_body("route not found"));
        }
        let mut limited = false;
        for limit in self.active_limits() {
            let key = match &limit.descriptor {
                Descriptor::RemoteAddress => Some("127.0.0.1".to_string()),
                Descriptor::Path(path) => (request.path == *path).then(|| path.to_string()),
                Descriptor::Header(name) => request
                    .headers
                    .iter()
                    .find(|(header, _)| header.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value.clone()),
            };
            let Some(key) = key else { continue };
            let count = self
                .counters
                .entry(format!("{}:{key}", limit.policy))
                .or_insert(0);
            *count += 1;
            if *count > limit.requests_per_window {
                limited = true;
            }
        }
        if limited {
            Ok(ObservedResponse::new(429)
                .with_header("x-ratelimit-remaining", "0")
                .with_body("rate limited"))
        } else {
            Ok(ObservedResponse::new(200).with_body("ok"))
        }
    }
}

/// Handle to the shared state, cloned into the cluster and the gateway.
#[derive(Debug, Clone, Default)]
pub struct FakeWorld(Arc<Mutex<World>>);

impl FakeWorld {
    pub fn lock(&self) -> MutexGuard<'_, World> {
        self.0.lock().expect("world lock poisoned")
    }

    /// Pre-installed gateway, proxy and the suite's manifests.
    pub fn rate_limit_cluster() -> Self {
        let world = Self::default();
        {
            let mut state = world.lock();
            state.gateway_address = Some(GATEWAY_ADDRESS.to_string());
            state.pending_polls = 2;
            state.route_warmup = 2;
            for (kind, name) in [
                ("gateway", "gateway"),
                ("deployment", "gateway"),
                ("service", "gateway"),
                ("serviceaccount", "gateway"),
            ] {
                state.present.insert(ObjectRef::new(kind, GATEWAY_NS, name));
            }
            state.pods.insert(
                PodSelector::new(GATEWAY_NS, "app.kubernetes.io/name=gateway"),
                vec!["Running".to_string()],
            );

            state.manifests.insert(
                "rate-limit-server.yaml".to_string(),
                Manifest {
                    objects: vec![
                        ObjectRef::new("deployment", EXTENSIONS_NS, "ratelimit"),
                        ObjectRef::new("service", EXTENSIONS_NS, "ratelimit"),
                        ObjectRef::new("configmap", EXTENSIONS_NS, "ratelimit-config"),
                    ],
                    pods: Some(PodSelector::new(EXTENSIONS_NS, "app=ratelimit")),
                    ..Manifest::default()
                },
            );
            state.manifests.insert(
                "routes.yaml".to_string(),
                Manifest {
                    objects: vec![
                        ObjectRef::new("httproute", GATEWAY_NS, "test-route-1"),
                        ObjectRef::new("httproute", GATEWAY_NS, "test-route-2"),
                    ],
                    routes: true,
                    ..Manifest::default()
                },
            );
            for (file, policy, descriptor) in [
                ("ip-rate-limit.yaml", "ip-rate-limit", Descriptor::RemoteAddress),
                ("path-rate-limit.yaml", "path-rate-limit", Descriptor::Path("/path1")),
                ("user-rate-limit.yaml", "user-rate-limit", Descriptor::Header("X-User-ID")),
                ("combined-rate-limit.yaml", "combined-rate-limit", Descriptor::RemoteAddress),
            ] {
                state.manifests.insert(
                    file.to_string(),
                    Manifest {
                        objects: vec![ObjectRef::new(
                            "agentgatewaypolicy",
                            GATEWAY_NS,
                            policy,
                        )],
                        limit: Some(Limit {
                            policy,
                            descriptor,
                            requests_per_window: 1,
                        }),
                        ..Manifest::default()
                    },
                );
            }
        }
        world
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn present(&self, object: &ObjectRef) -> bool {
        self.lock().present.contains(object)
    }

    pub fn applied(&self) -> Vec<String> {
        self.lock().applied.clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct FakeCluster(pub FakeWorld);

#[async_trait]
impl ManifestDeployer for FakeCluster {
    async fn apply(&self, manifests: &[PathBuf]) -> Result<()> {
        let mut world = self.0.lock();
        for manifest in manifests {
            let name = file_name(manifest);
            world.calls.push(format!("apply {name}"));
            world.apply(&name)?;
        }
        Ok(())
    }

    async fn delete(&self, manifests: &[PathBuf]) -> Result<()> {
        let mut world = self.0.lock();
        for manifest in manifests {
            let name = file_name(manifest);
            world.calls.push(format!("delete {name}"));
            if world.fail_delete {
                bail!("error: unable to delete {name}");
            }
            world.delete(&name);
        }
        Ok(())
    }
}

#[async_trait]
impl ResourcePoller for FakeCluster {
    async fn object_exists(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self.0.lock().present.contains(object))
    }

    async fn pod_phases(&self, selector: &PodSelector) -> Result<Vec<String>> {
        Ok(self.0.lock().phases(selector))
    }
}

#[async_trait]
impl EndpointResolver for FakeCluster {
    async fn gateway_address(&self, _name: &NamespacedName) -> Result<Option<String>> {
        Ok(self.0.lock().gateway_address.clone())
    }
}

pub struct FakeGateway(pub FakeWorld);

#[async_trait]
impl Probe for FakeGateway {
    async fn execute(&self, request: &ProbeRequest) -> Result<ObservedResponse, TransportError> {
        assert_eq!(request.address, GATEWAY_ADDRESS, "probe sent to wrong address");
        self.0.lock().handle(request)
    }
}

pub const SUITE: &str = r#"
name = "global-rate-limit"

[gateway]
name = "gateway"
namespace = "agentgateway-base"

[timing]
probe_timeout_secs = 5
probe_interval_ms = 100
fixture_timeout_secs = 10
fixture_interval_ms = 200

[shared]
manifests = ["testdata/rate-limit-server.yaml"]
objects = [
  { kind = "deployment", name = "ratelimit", namespace = "kgateway-test-extensions" },
  { kind = "service", name = "ratelimit", namespace = "kgateway-test-extensions" },
  { kind = "configmap", name = "ratelimit-config", namespace = "kgateway-test-extensions" },
]
verify = [
  { kind = "gateway", name = "gateway", namespace = "agentgateway-base" },
  { kind = "deployment", name = "gateway", namespace = "agentgateway-base" },
  { kind = "service", name = "gateway", namespace = "agentgateway-base" },
  { kind = "serviceaccount", name = "gateway", namespace = "agentgateway-base" },
]
pods = [
  { namespace = "kgateway-test-extensions", selector = "app=ratelimit", owned = true },
  { namespace = "agentgateway-base", selector = "app.kubernetes.io/name=gateway" },
]

[[scenarios]]
name = "rate-limit-by-remote-address"
manifests = ["testdata/routes.yaml", "testdata/ip-rate-limit.yaml"]
objects = [
  { kind = "httproute", name = "test-route-1", namespace = "agentgateway-base" },
  { kind = "httproute", name = "test-route-2", namespace = "agentgateway-base" },
  { kind = "agentgatewaypolicy", name = "ip-rate-limit", namespace = "agentgateway-base" },
]
steps = [
  { kind = "expect", path = "/path1", host = "example.com", status = 200 },
  { kind = "burst", path = "/path1", host = "example.com", status = 429 },
  { kind = "burst", path = "/path2", host = "example.com", status = 429 },
]

[[scenarios]]
name = "rate-limit-by-path"
manifests = ["testdata/routes.yaml", "testdata/path-rate-limit.yaml"]
objects = [
  { kind = "httproute", name = "test-route-1", namespace = "agentgateway-base" },
  { kind = "httproute", name = "test-route-2", namespace = "agentgateway-base" },
  { kind = "agentgatewaypolicy", name = "path-rate-limit", namespace = "agentgateway-base" },
]
steps = [
  { kind = "expect", path = "/path1", host = "example.com", status = 200 },
  { kind = "burst", path = "/path1", host = "example.com", status = 429 },
  { kind = "burst", path = "/path2", host = "example.com", status = 200 },
]

[[scenarios]]
name = "rate-limit-by-user-id"
manifests = ["testdata/routes.yaml", "testdata/user-rate-limit.yaml"]
objects = [
  { kind = "httproute", name = "test-route-1", namespace = "agentgateway-base" },
  { kind = "httproute", name = "test-route-2", namespace = "agentgateway-base" },
  { kind = "agentgatewaypolicy", name = "user-rate-limit", namespace = "agentgateway-base" },
]
steps = [
  { kind = "expect", path = "/path1", host = "example.com", headers = { "X-User-ID" = "user1" }, status = 200 },
  { kind = "burst", path = "/path1", host = "example.com", headers = { "X-User-ID" = "user1" }, status = 429 },
  { kind = "expect", path = "/path1", host = "example.com", headers = { "X-User-ID" = "user2" }, status = 200 },
]

[[scenarios]]
name = "combined-local-and-global-rate-limit"
manifests = ["testdata/routes.yaml", "testdata/combined-rate-limit.yaml"]
objects = [
  { kind = "httproute", name = "test-route-1", namespace = "agentgateway-base" },
  { kind = "httproute", name = "test-route-2", namespace = "agentgateway-base" },
  { kind = "agentgatewaypolicy", name = "combined-rate-limit", namespace = "agentgateway-base" },
]
steps = [
  { kind = "expect", path = "/path1", host = "example.com", status = 200 },
  { kind = "burst", path = "/path1", host = "example.com", status = 429 },
]
"#;

pub fn suite() -> SuiteConfig {
    suite_from(SUITE)
}

pub fn suite_from(text: &str) -> SuiteConfig {
    SuiteConfig::from_toml_str(text, Path::new("/suites/global-rate-limit")).expect("parse suite")
}
