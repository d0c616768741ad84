//! Suite lifecycle: shared fixtures, scenarios in order, cleanup, report.

pub mod lifecycle;
pub mod report;
pub mod runner;
pub mod scenario;

pub use lifecycle::{
    ScenarioRun, SuiteContext, SuiteLifecycle, object_ref, pod_selector, scenario_fixture,
    shared_fixture,
};
pub use report::{RunReport, ScenarioReport, ScenarioStatus};
pub use runner::SuiteRunner;
pub use scenario::run_steps;
