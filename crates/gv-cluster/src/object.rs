use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A control-plane object, e.g. `deployment kgateway-test-extensions/ratelimit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectRef {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl ObjectRef {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Pods matched by a label selector in one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PodSelector {
    pub namespace: String,
    pub label_selector: String,
}

impl PodSelector {
    pub fn new(namespace: impl Into<String>, label_selector: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            label_selector: label_selector.into(),
        }
    }
}

impl fmt::Display for PodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pods {} -l {}", self.namespace, self.label_selector)
    }
}

/// Manifests and the objects they create. Applied and deleted as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fixture {
    pub manifests: Vec<PathBuf>,
    pub objects: Vec<ObjectRef>,
}

impl Fixture {
    pub fn new(manifests: Vec<PathBuf>, objects: Vec<ObjectRef>) -> Self {
        Self { manifests, objects }
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty() && self.objects.is_empty()
    }
}
