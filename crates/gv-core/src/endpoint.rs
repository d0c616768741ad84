use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace-qualified control-plane name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A resolved, reachable gateway.
///
/// Built once per suite after the gateway reports an address and handed to
/// every scenario by value. There are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayEndpoint {
    name: NamespacedName,
    address: String,
}

impl GatewayEndpoint {
    pub fn new(name: NamespacedName, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }

    pub fn name(&self) -> &NamespacedName {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for GatewayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
