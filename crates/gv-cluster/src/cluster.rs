//! Seams to the control plane. Every check here is single-shot; waiting is
//! the caller's job, done through the retry engine.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use gv_core::NamespacedName;

use crate::object::{ObjectRef, PodSelector};

/// Pod phase reported for a running pod.
pub const POD_PHASE_RUNNING: &str = "Running";

#[async_trait]
pub trait ManifestDeployer: Send + Sync {
    async fn apply(&self, manifests: &[PathBuf]) -> Result<()>;

    /// Must succeed when the resources are already gone.
    async fn delete(&self, manifests: &[PathBuf]) -> Result<()>;
}

#[async_trait]
pub trait ResourcePoller: Send + Sync {
    async fn object_exists(&self, object: &ObjectRef) -> Result<bool>;

    /// Phase of every pod the selector matches (empty when none).
    async fn pod_phases(&self, selector: &PodSelector) -> Result<Vec<String>>;

    /// Objects from `objects` not (yet) visible.
    async fn missing_objects(&self, objects: &[ObjectRef]) -> Result<Vec<ObjectRef>> {
        let mut missing = Vec::new();
        for object in objects {
            if !self.object_exists(object).await? {
                missing.push(object.clone());
            }
        }
        Ok(missing)
    }

    /// Objects from `objects` still visible.
    async fn remaining_objects(&self, objects: &[ObjectRef]) -> Result<Vec<ObjectRef>> {
        let mut remaining = Vec::new();
        for object in objects {
            if self.object_exists(object).await? {
                remaining.push(object.clone());
            }
        }
        Ok(remaining)
    }

    async fn objects_exist(&self, objects: &[ObjectRef]) -> Result<bool> {
        Ok(self.missing_objects(objects).await?.is_empty())
    }

    async fn objects_absent(&self, objects: &[ObjectRef]) -> Result<bool> {
        Ok(self.remaining_objects(objects).await?.is_empty())
    }

    async fn pods_running(&self, selector: &PodSelector) -> Result<bool> {
        Ok(all_running(&self.pod_phases(selector).await?))
    }

    async fn pods_absent(&self, selector: &PodSelector) -> Result<bool> {
        Ok(self.pod_phases(selector).await?.is_empty())
    }
}

#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// The gateway's first reported address, or `None` until it has one.
    async fn gateway_address(&self, name: &NamespacedName) -> Result<Option<String>>;
}

/// Everything the suite lifecycle needs from a cluster.
pub trait Cluster: ManifestDeployer + ResourcePoller + EndpointResolver {}

impl<T: ManifestDeployer + ResourcePoller + EndpointResolver> Cluster for T {}

/// At least one pod matched and all of them run.
pub fn all_running(phases: &[String]) -> bool {
    !phases.is_empty() && phases.iter().all(|phase| phase == POD_PHASE_RUNNING)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    struct StaticCluster {
        present: HashSet<ObjectRef>,
        phases: Vec<String>,
    }

    #[async_trait]
    impl ResourcePoller for StaticCluster {
        async fn object_exists(&self, object: &ObjectRef) -> Result<bool> {
            Ok(self.present.contains(object))
        }

        async fn pod_phases(&self, _selector: &PodSelector) -> Result<Vec<String>> {
            Ok(self.phases.clone())
        }
    }

    #[tokio::test]
    async fn test_provided_checks_compose_single_shot_queries() -> Result<()> {
        let route = ObjectRef::new("httproute", "agentgateway-base", "test-route-1");
        let policy = ObjectRef::new("policy", "agentgateway-base", "ip-rate-limit");
        let cluster = StaticCluster {
            present: HashSet::from([route.clone()]),
            phases: vec!["Running".to_string()],
        };
        let both = [route.clone(), policy.clone()];

        assert_eq!(cluster.missing_objects(&both).await?, vec![policy.clone()]);
        assert_eq!(cluster.remaining_objects(&both).await?, vec![route.clone()]);
        assert!(!cluster.objects_exist(&both).await?);
        assert!(cluster.objects_exist(&[route]).await?);
        assert!(cluster.objects_absent(&[policy]).await?);

        let selector = PodSelector::new("kgateway-test-extensions", "app=ratelimit");
        assert!(cluster.pods_running(&selector).await?);
        assert!(!cluster.pods_absent(&selector).await?);
        Ok(())
    }

    #[test]
    fn test_all_running() {
        assert!(!all_running(&[]));
        assert!(all_running(&["Running".to_string(), "Running".to_string()]));
        assert!(!all_running(&["Running".to_string(), "Pending".to_string()]));
    }
}
