use std::path::Path;

use anyhow::Result;
use gv_config::{SuiteConfig, validate_config};
use serde::Serialize;

use crate::cli::OutputFormat;

#[derive(Serialize)]
struct ScenarioSummary<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    steps: usize,
}

fn summaries(config: &SuiteConfig) -> Vec<ScenarioSummary<'_>> {
    config
        .scenarios
        .iter()
        .map(|scenario| ScenarioSummary {
            name: &scenario.name,
            description: scenario.description.as_deref(),
            steps: scenario.steps.len(),
        })
        .collect()
}

pub(crate) fn handle_validate(path: &Path, format: OutputFormat) -> Result<()> {
    let config = validate_config(path)?;
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": true,
                "suite": config.name,
                "scenarios": config.scenario_names(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!(
                "Suite '{}' is valid ({} scenario(s))",
                config.name,
                config.scenarios.len()
            );
        }
    }
    Ok(())
}

pub(crate) fn handle_list(path: &Path, format: OutputFormat) -> Result<()> {
    let config = SuiteConfig::load(path)?;
    let scenarios = summaries(&config);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&scenarios)?),
        OutputFormat::Text => {
            for scenario in &scenarios {
                match scenario.description {
                    Some(description) => println!(
                        "{}  ({} steps)  {description}",
                        scenario.name, scenario.steps
                    ),
                    None => println!("{}  ({} steps)", scenario.name, scenario.steps),
                }
            }
        }
    }
    Ok(())
}
