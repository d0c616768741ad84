//! Suite configuration loading and validation (`suite.toml`).

pub mod cleanup;
pub mod config;
pub mod validate;

pub use cleanup::{CleanupPolicy, SKIP_CLEANUP_ENV};
pub use config::{
    BurstConfig, ExpectConfig, GatewayConfig, KubectlConfig, ObjectConfig, PodConfig,
    RequestConfig, ScenarioConfig, SharedConfig, StepConfig, SuiteConfig, TimingConfig,
};
pub use validate::{validate_config, validate_loaded_config};
