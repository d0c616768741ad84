//! Shared and per-scenario fixtures.
//!
//! Every wait here drives a single-shot cluster check through
//! [`retry_until`] under the suite's fixture policy, so each one has a hard
//! ceiling and stops promptly on cancellation.

use std::future::Future;

use anyhow::{Context, Result, anyhow};
use gv_cluster::{Cluster, Fixture, ObjectRef, POD_PHASE_RUNNING, PodSelector, all_running};
use gv_config::{CleanupPolicy, ObjectConfig, PodConfig, ScenarioConfig, SuiteConfig};
use gv_core::{AttemptError, GatewayEndpoint, NamespacedName, RetryPolicy, retry_until};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What scenarios see of the suite once setup succeeded.
#[derive(Debug, Clone)]
pub struct SuiteContext {
    endpoint: GatewayEndpoint,
}

impl SuiteContext {
    pub fn new(endpoint: GatewayEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &GatewayEndpoint {
        &self.endpoint
    }
}

/// Result of a scoped scenario run. Cleanup is reported next to the body's
/// outcome, never in place of it.
#[derive(Debug)]
pub struct ScenarioRun<T> {
    pub outcome: Result<T>,
    pub cleanup: Result<()>,
}

pub struct SuiteLifecycle<'a> {
    config: &'a SuiteConfig,
    cluster: &'a dyn Cluster,
    fixture_policy: RetryPolicy,
    cleanup: CleanupPolicy,
    cancel: CancellationToken,
}

impl<'a> SuiteLifecycle<'a> {
    pub fn new(
        config: &'a SuiteConfig,
        cluster: &'a dyn Cluster,
        fixture_policy: RetryPolicy,
        cleanup: CleanupPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            cluster,
            fixture_policy,
            cleanup,
            cancel,
        }
    }

    /// Apply shared fixtures, wait for them and for the pre-installed gateway,
    /// then resolve the endpoint every scenario probes.
    pub async fn setup_suite(&self) -> Result<SuiteContext> {
        let shared = shared_fixture(self.config);
        info!(
            suite = %self.config.name,
            manifests = shared.manifests.len(),
            "Setting up shared fixtures"
        );
        self.cluster
            .apply(&shared.manifests)
            .await
            .context("failed to apply shared manifests")?;
        self.await_exists(&shared.objects).await?;

        let verified: Vec<ObjectRef> = self.config.shared.verify.iter().map(object_ref).collect();
        self.await_exists(&verified).await?;

        for selector in self.config.shared.pods.iter().map(pod_selector) {
            self.await_pods_running(&selector).await?;
        }

        let endpoint = self.resolve_endpoint().await?;
        info!(%endpoint, "Gateway endpoint resolved");
        Ok(SuiteContext::new(endpoint))
    }

    /// Apply `fixture`, wait for it, run `body`, then clean up regardless of
    /// how the body (or the apply) went.
    pub async fn run_scenario<T, F, Fut>(&self, fixture: &Fixture, body: F) -> ScenarioRun<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = match self.prepare_fixture(fixture).await {
            Ok(()) => body().await,
            Err(err) => Err(err),
        };
        let cleanup = self.cleanup_fixture(fixture).await;
        if let Err(err) = &cleanup {
            warn!(error = %format!("{err:#}"), "Scenario cleanup failed");
        }
        ScenarioRun { outcome, cleanup }
    }

    /// Delete shared fixtures and wait for them and their pods to go.
    pub async fn teardown_suite(&self) -> Result<()> {
        if self.cleanup.should_skip() {
            info!(suite = %self.config.name, "Skipping suite teardown");
            return Ok(());
        }
        let shared = shared_fixture(self.config);
        info!(suite = %self.config.name, "Tearing down shared fixtures");
        self.cluster
            .delete(&shared.manifests)
            .await
            .context("failed to delete shared manifests")?;
        if self.cancel.is_cancelled() {
            warn!("Run cancelled; not waiting for shared fixtures to disappear");
            return Ok(());
        }
        self.await_absent(&shared.objects).await?;
        for selector in self.config.shared.pods.iter().filter(|pods| pods.owned) {
            self.await_pods_absent(&pod_selector(selector)).await?;
        }
        Ok(())
    }

    async fn prepare_fixture(&self, fixture: &Fixture) -> Result<()> {
        self.cluster
            .apply(&fixture.manifests)
            .await
            .context("failed to apply scenario manifests")?;
        self.await_exists(&fixture.objects).await
    }

    async fn cleanup_fixture(&self, fixture: &Fixture) -> Result<()> {
        if self.cleanup.should_skip() {
            info!("Skipping scenario cleanup");
            return Ok(());
        }
        self.cluster
            .delete(&fixture.manifests)
            .await
            .context("failed to delete scenario manifests")?;
        if self.cancel.is_cancelled() {
            warn!("Run cancelled; not waiting for scenario fixtures to disappear");
            return Ok(());
        }
        self.await_absent(&fixture.objects).await
    }

    async fn resolve_endpoint(&self) -> Result<GatewayEndpoint> {
        let gateway = &self.config.gateway;
        let name = gateway.namespaced_name();
        let address = match &gateway.address {
            Some(address) => address.clone(),
            None => self.await_gateway_address(&name).await?,
        };
        let address = match gateway.port {
            Some(port) => format!("{address}:{port}"),
            None => address,
        };
        Ok(GatewayEndpoint::new(name, address))
    }

    async fn poll<T, F, Fut>(&self, what: String, check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError<String>>>,
    {
        info!(%what, "Waiting");
        retry_until(&self.fixture_policy, &self.cancel, check)
            .await
            .map_err(|err| anyhow!("waiting for {what}: {err}"))
    }

    pub async fn await_exists(&self, objects: &[ObjectRef]) -> Result<()> {
        if objects.is_empty() {
            return Ok(());
        }
        self.poll(format!("{} to exist", list(objects)), || async move {
            match self.cluster.missing_objects(objects).await {
                Ok(missing) if missing.is_empty() => Ok(()),
                Ok(missing) => Err(AttemptError::Transient(format!(
                    "still missing: {}",
                    list(&missing)
                ))),
                Err(err) => Err(AttemptError::Transient(format!("{err:#}"))),
            }
        })
        .await
    }

    pub async fn await_absent(&self, objects: &[ObjectRef]) -> Result<()> {
        if objects.is_empty() {
            return Ok(());
        }
        self.poll(format!("{} to be deleted", list(objects)), || async move {
            match self.cluster.remaining_objects(objects).await {
                Ok(remaining) if remaining.is_empty() => Ok(()),
                Ok(remaining) => Err(AttemptError::Transient(format!(
                    "still present: {}",
                    list(&remaining)
                ))),
                Err(err) => Err(AttemptError::Transient(format!("{err:#}"))),
            }
        })
        .await
    }

    pub async fn await_pods_running(&self, selector: &PodSelector) -> Result<()> {
        self.poll(format!("{selector} to be {POD_PHASE_RUNNING}"), || async move {
            match self.cluster.pod_phases(selector).await {
                Ok(phases) if all_running(&phases) => Ok(()),
                Ok(phases) if phases.is_empty() => {
                    Err(AttemptError::Transient("no pods matched".to_string()))
                }
                Ok(phases) => Err(AttemptError::Transient(format!(
                    "pod phases: {}",
                    phases.join(", ")
                ))),
                Err(err) => Err(AttemptError::Transient(format!("{err:#}"))),
            }
        })
        .await
    }

    pub async fn await_pods_absent(&self, selector: &PodSelector) -> Result<()> {
        self.poll(format!("{selector} to terminate"), || async move {
            match self.cluster.pod_phases(selector).await {
                Ok(phases) if phases.is_empty() => Ok(()),
                Ok(phases) => Err(AttemptError::Transient(format!(
                    "{} pod(s) remain",
                    phases.len()
                ))),
                Err(err) => Err(AttemptError::Transient(format!("{err:#}"))),
            }
        })
        .await
    }

    pub async fn await_gateway_address(&self, name: &NamespacedName) -> Result<String> {
        self.poll(format!("gateway {name} to report an address"), || async move {
            match self.cluster.gateway_address(name).await {
                Ok(Some(address)) => Ok(address),
                Ok(None) => Err(AttemptError::Transient("no address yet".to_string())),
                Err(err) => Err(AttemptError::Transient(format!("{err:#}"))),
            }
        })
        .await
    }
}

pub fn object_ref(object: &ObjectConfig) -> ObjectRef {
    ObjectRef::new(&object.kind, &object.namespace, &object.name)
}

pub fn pod_selector(pods: &PodConfig) -> PodSelector {
    PodSelector::new(&pods.namespace, &pods.selector)
}

/// Manifests the suite owns for its whole run, with the objects they create.
pub fn shared_fixture(config: &SuiteConfig) -> Fixture {
    Fixture::new(
        config.shared.manifests.clone(),
        config.shared.objects.iter().map(object_ref).collect(),
    )
}

pub fn scenario_fixture(scenario: &ScenarioConfig) -> Fixture {
    Fixture::new(
        scenario.manifests.clone(),
        scenario.objects.iter().map(object_ref).collect(),
    )
}

fn list(objects: &[ObjectRef]) -> String {
    objects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
