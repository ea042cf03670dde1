use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::service::{BindMount, Endpoint, Lifetime};

/// How a dependent relates to its dependency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    /// The dependent must not start until the dependency is Ready.
    WaitFor,
    /// The dependent is grouped under the dependency; stopping the
    /// dependency stops the dependent. No start-order constraint.
    ParentOf,
}

/// `dependent` relates to `dependency` by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub dependent: String,
    pub dependency: String,
    pub kind: EdgeKind,
}

impl DependencyEdge {
    pub fn wait_for(dependent: &str, dependency: &str) -> Self {
        Self {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
            kind: EdgeKind::WaitFor,
        }
    }

    pub fn parent_of(child: &str, parent: &str) -> Self {
        Self {
            dependent: child.to_string(),
            dependency: parent.to_string(),
            kind: EdgeKind::ParentOf,
        }
    }
}

/// A topology file: the typed, declarative description of a dev environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TopologySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Container network shared by every service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub services: Vec<ServiceSpec>,
}

/// One service entry in a topology file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    /// Appended to `image` as `image:tag` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<BindMount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default)]
    pub lifetime: Lifetime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_for: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_timeout_secs: Option<u64>,
    /// Command run inside the container to report health, for images that
    /// ship without a healthcheck.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_cmd: Option<String>,
}

impl ServiceSpec {
    /// Full image reference, with the tag applied.
    pub fn image_reference(&self) -> String {
        match self.tag.as_deref() {
            Some(tag) if !tag.is_empty() => format!("{}:{tag}", self.image),
            _ => self.image.clone(),
        }
    }

    /// Edges declared by this entry, `waitFor` first.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self
            .wait_for
            .iter()
            .map(|dep| DependencyEdge::wait_for(&self.name, dep))
            .collect();
        if let Some(ref parent) = self.parent {
            edges.push(DependencyEdge::parent_of(&self.name, parent));
        }
        edges
    }
}

impl TopologySpec {
    /// All edges declared across the file, in declaration order.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.services.iter().flat_map(|s| s.edges()).collect()
    }
}
