use anyhow::{Context, Result};
use gv_config::StepConfig;
use gv_core::{GatewayEndpoint, Verifier, WindowBudget};
use tracing::info;

/// Run `steps` in the order written, stopping at the first failure.
pub async fn run_steps(
    verifier: &Verifier<'_>,
    endpoint: &GatewayEndpoint,
    budget: WindowBudget,
    steps: &[StepConfig],
) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        info!(step = number, kind = step.kind(), path = %step.request().path, "Running step");
        run_step(verifier, endpoint, budget, step)
            .await
            .with_context(|| format!("step {number} ({})", step.kind()))?;
    }
    Ok(())
}

async fn run_step(
    verifier: &Verifier<'_>,
    endpoint: &GatewayEndpoint,
    budget: WindowBudget,
    step: &StepConfig,
) -> Result<()> {
    let request = step.request().to_request(endpoint.address());
    match step {
        StepConfig::Expect { expect, .. } => {
            verifier
                .expect_response(&request, &expect.to_expected())
                .await?
        }
        StepConfig::Burst { expect, .. } => {
            verifier
                .expect_burst(budget, &request, &expect.to_expected())
                .await?
        }
        StepConfig::ExpectError { .. } => {
            let expected_root = step.expected_root_cause();
            let error = verifier
                .expect_transport_failure(&request, expected_root.as_deref())
                .await?;
            info!(root_cause = %error.root_description(), "Observed expected connection failure");
        }
    }
    Ok(())
}
