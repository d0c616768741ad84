//! Runs a whole suite: setup, the selected scenarios in order, teardown.

use anyhow::{Result, bail};
use gv_cluster::Cluster;
use gv_config::{CleanupPolicy, ScenarioConfig, SuiteConfig};
use gv_core::{Probe, RetryPolicy, Verifier, WindowBudget};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::lifecycle::{SuiteContext, SuiteLifecycle, scenario_fixture};
use crate::report::{RunReport, ScenarioReport};
use crate::scenario::run_steps;

pub struct SuiteRunner<'a> {
    config: &'a SuiteConfig,
    cluster: &'a dyn Cluster,
    probe: &'a dyn Probe,
    cleanup: CleanupPolicy,
    cancel: CancellationToken,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(config: &'a SuiteConfig, cluster: &'a dyn Cluster, probe: &'a dyn Probe) -> Self {
        Self {
            config,
            cluster,
            probe,
            cleanup: CleanupPolicy::from_flags(config.skip_cleanup),
            cancel: CancellationToken::new(),
        }
    }

    /// `skip_cleanup = true` in the suite file always wins.
    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        if !self.config.skip_cleanup {
            self.cleanup = cleanup;
        }
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Scenarios named in `selected` (all when empty), in suite-file order.
    pub fn select(&self, selected: &[String]) -> Result<Vec<&'a ScenarioConfig>> {
        for name in selected {
            if self.config.scenario(name).is_none() {
                bail!(
                    "unknown scenario '{name}' (available: {})",
                    self.config.scenario_names().join(", ")
                );
            }
        }
        Ok(self
            .config
            .scenarios
            .iter()
            .filter(|s| selected.is_empty() || selected.contains(&s.name))
            .collect())
    }

    /// Errors only on unusable configuration; everything that happens against
    /// the cluster or gateway lands in the report.
    pub async fn run(&self, selected: &[String]) -> Result<RunReport> {
        let scenarios = self.select(selected)?;
        let timing = &self.config.timing;
        let fixture_policy = RetryPolicy::new(timing.fixture_timeout(), timing.fixture_interval())?;
        let probe_policy = RetryPolicy::new(timing.probe_timeout(), timing.probe_interval())?;
        let budget = WindowBudget::new(self.config.burst.size)?;

        let lifecycle = SuiteLifecycle::new(
            self.config,
            self.cluster,
            fixture_policy,
            self.cleanup,
            self.cancel.clone(),
        );
        let mut report = RunReport::start(&self.config.name);
        info!(
            run_id = %report.run_id,
            suite = %self.config.name,
            scenarios = scenarios.len(),
            "Starting run"
        );

        match lifecycle.setup_suite().await {
            Ok(context) => {
                for scenario in scenarios {
                    let outcome = if self.cancel.is_cancelled() {
                        ScenarioReport::skipped(&scenario.name, "run cancelled")
                    } else {
                        self.run_scenario(&lifecycle, &context, probe_policy, budget, scenario)
                            .await
                    };
                    report.record(outcome);
                }
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(error = %message, "Suite setup failed; no scenario will run");
                report.setup_error = Some(message);
                for scenario in scenarios {
                    report.record(ScenarioReport::skipped(&scenario.name, "suite setup failed"));
                }
            }
        }

        if let Err(err) = lifecycle.teardown_suite().await {
            let message = format!("{err:#}");
            error!(error = %message, "Suite teardown failed");
            report.teardown_error = Some(message);
        }
        report.finish(self.cancel.is_cancelled());
        Ok(report)
    }

    async fn run_scenario(
        &self,
        lifecycle: &SuiteLifecycle<'_>,
        context: &SuiteContext,
        probe_policy: RetryPolicy,
        budget: WindowBudget,
        scenario: &ScenarioConfig,
    ) -> ScenarioReport {
        info!(scenario = %scenario.name, "Running scenario");
        let started = Instant::now();
        let verifier = Verifier::new(self.probe, probe_policy, &self.cancel);
        let run = lifecycle
            .run_scenario(&scenario_fixture(scenario), || {
                run_steps(&verifier, context.endpoint(), budget, &scenario.steps)
            })
            .await;
        let elapsed = started.elapsed();

        let report = match run.outcome {
            Ok(()) => {
                info!(scenario = %scenario.name, ?elapsed, "Scenario passed");
                ScenarioReport::passed(&scenario.name, elapsed)
            }
            Err(err) => {
                let diagnostic = format!("{err:#}");
                error!(scenario = %scenario.name, %diagnostic, "Scenario failed");
                ScenarioReport::failed(&scenario.name, elapsed, diagnostic)
            }
        };
        match run.cleanup {
            Ok(()) => report,
            Err(err) => report.with_cleanup_error(format!("{err:#}")),
        }
    }
}
