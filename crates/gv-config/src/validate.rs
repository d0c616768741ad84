use anyhow::{Result, bail};
use std::collections::HashSet;
use std::path::Path;

use crate::config::{ObjectConfig, StepConfig, SuiteConfig};

/// Load and validate a suite file.
pub fn validate_config(path: &Path) -> Result<SuiteConfig> {
    let config = SuiteConfig::load(path)?;
    validate_loaded_config(&config)?;
    Ok(config)
}

/// Validate an already-loaded suite. Stops at the first problem.
pub fn validate_loaded_config(config: &SuiteConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        bail!("name cannot be empty");
    }
    validate_gateway(config)?;
    validate_timing(config)?;
    validate_burst(config)?;
    validate_shared(config)?;
    validate_scenarios(config)?;
    Ok(())
}

fn validate_gateway(config: &SuiteConfig) -> Result<()> {
    if config.gateway.name.is_empty() || config.gateway.namespace.is_empty() {
        bail!("gateway.name and gateway.namespace must both be set");
    }
    if config.gateway.port == Some(0) {
        bail!("gateway.port must be > 0 (got 0)");
    }
    Ok(())
}

fn validate_timing(config: &SuiteConfig) -> Result<()> {
    let timing = &config.timing;
    for (key, value) in [
        ("timing.probe_timeout_secs", timing.probe_timeout_secs),
        ("timing.probe_interval_ms", timing.probe_interval_ms),
        ("timing.fixture_timeout_secs", timing.fixture_timeout_secs),
        ("timing.fixture_interval_ms", timing.fixture_interval_ms),
        ("timing.request_timeout_secs", timing.request_timeout_secs),
    ] {
        if value == 0 {
            bail!("{key} must be > 0 (got 0)");
        }
    }
    if timing.probe_interval() >= timing.probe_timeout() {
        bail!(
            "timing.probe_interval_ms ({}) must be shorter than timing.probe_timeout_secs ({}s)",
            timing.probe_interval_ms,
            timing.probe_timeout_secs
        );
    }
    if timing.fixture_interval() >= timing.fixture_timeout() {
        bail!(
            "timing.fixture_interval_ms ({}) must be shorter than timing.fixture_timeout_secs ({}s)",
            timing.fixture_interval_ms,
            timing.fixture_timeout_secs
        );
    }
    Ok(())
}

fn validate_burst(config: &SuiteConfig) -> Result<()> {
    if let Err(err) = gv_core::WindowBudget::new(config.burst.size) {
        bail!("burst.size: {err}");
    }
    Ok(())
}

fn validate_shared(config: &SuiteConfig) -> Result<()> {
    for manifest in &config.shared.manifests {
        validate_manifest("shared.manifests", manifest)?;
    }
    validate_objects("shared.objects", &config.shared.objects)?;
    validate_objects("shared.verify", &config.shared.verify)?;
    if !config.shared.manifests.is_empty() && config.shared.objects.is_empty() {
        bail!("shared.objects must list the objects created by shared.manifests");
    }
    for pod in &config.shared.pods {
        if pod.selector.trim().is_empty() {
            bail!("shared.pods selector cannot be empty (namespace {})", pod.namespace);
        }
    }
    Ok(())
}

fn validate_scenarios(config: &SuiteConfig) -> Result<()> {
    if config.scenarios.is_empty() {
        bail!("suite '{}' has no scenarios", config.name);
    }
    let mut seen = HashSet::new();
    for scenario in &config.scenarios {
        if scenario.name.trim().is_empty() {
            bail!("scenario name cannot be empty");
        }
        if !seen.insert(scenario.name.as_str()) {
            bail!("duplicate scenario name '{}'", scenario.name);
        }
        let field = format!("scenarios.{}", scenario.name);
        for manifest in &scenario.manifests {
            validate_manifest(&format!("{field}.manifests"), manifest)?;
        }
        validate_objects(&format!("{field}.objects"), &scenario.objects)?;
        if !scenario.manifests.is_empty() && scenario.objects.is_empty() {
            bail!("{field}.objects must list the objects created by its manifests");
        }
        if scenario.steps.is_empty() {
            bail!("{field} has no steps");
        }
        for (index, step) in scenario.steps.iter().enumerate() {
            validate_step(&format!("{field}.steps[{index}]"), step)?;
        }
    }
    Ok(())
}

fn validate_step(field: &str, step: &StepConfig) -> Result<()> {
    if step.request().path.is_empty() {
        bail!("{field}.path cannot be empty");
    }
    match step {
        StepConfig::Expect { expect, .. } | StepConfig::Burst { expect, .. } => {
            if !(100..=599).contains(&expect.status) {
                bail!("{field}.status must be a valid HTTP status (got {})", expect.status);
            }
            if expect.body_equals.is_some() && expect.body_contains.is_some() {
                bail!("{field}: set either body_equals or body_contains, not both");
            }
        }
        StepConfig::ExpectError {
            curl_exit_code: Some(code),
            root_cause: None,
            ..
        } => {
            if gv_core::curl_exit_description(*code).is_none() {
                bail!(
                    "{field}.curl_exit_code {code} has no known root cause; set root_cause instead"
                );
            }
        }
        StepConfig::ExpectError { .. } => {}
    }
    Ok(())
}

fn validate_manifest(field: &str, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("{field}: manifest not found: {}", path.display());
    }
    Ok(())
}

fn validate_objects(field: &str, objects: &[ObjectConfig]) -> Result<()> {
    for object in objects {
        if object.kind.is_empty() || object.name.is_empty() || object.namespace.is_empty() {
            bail!("{field}: kind, name and namespace are required (got {object:?})");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
