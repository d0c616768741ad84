//! Control-plane collaborators: apply and delete manifests, poll for
//! objects and pods, resolve the gateway's address.

pub mod cluster;
pub mod kubectl;
pub mod object;

pub use cluster::{
    Cluster, EndpointResolver, ManifestDeployer, POD_PHASE_RUNNING, ResourcePoller, all_running,
};
pub use kubectl::Kubectl;
pub use object::{Fixture, ObjectRef, PodSelector};
