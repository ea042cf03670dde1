use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{LauncherError, Result};
use crate::models::{EdgeKind, ServiceDefinition, ServiceSpec, TopologySpec};
use crate::services::definition::ServiceDefinitionBuilder;
use crate::services::graph::DependencyGraph;

pub const DEFAULT_NETWORK: &str = "topology-launcher";

/// A validated topology: immutable definitions plus their dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    name: Option<String>,
    network: String,
    definitions: IndexMap<String, ServiceDefinition>,
    graph: DependencyGraph,
}

/// Validate a topology file and compile it into a [`Topology`].
///
/// Pure apart from reading mount-source metadata: nothing is started or
/// created. Relative mount sources resolve against `base_dir`.
pub fn compile(spec: &TopologySpec, base_dir: &Path) -> Result<Topology> {
    if spec.services.is_empty() {
        return Err(LauncherError::InvalidConfig(
            "topology must declare at least one service".into(),
        ));
    }

    let mut definitions: IndexMap<String, ServiceDefinition> = IndexMap::new();
    let mut published: HashMap<u16, String> = HashMap::new();

    for service in &spec.services {
        let definition = ServiceDefinitionBuilder::from_spec(service, base_dir).build()?;

        if definitions.contains_key(definition.name()) {
            return Err(LauncherError::InvalidDefinition(format!(
                "service '{}' is declared more than once",
                definition.name()
            )));
        }

        for endpoint in definition.endpoints() {
            if let Some(owner) = published.insert(endpoint.port, definition.name().to_string()) {
                return Err(LauncherError::InvalidDefinition(format!(
                    "published port {} is used by both '{owner}' and '{}'",
                    endpoint.port,
                    definition.name()
                )));
            }
        }

        definitions.insert(definition.name().to_string(), definition);
    }

    let mut graph = DependencyGraph::new();
    for name in definitions.keys() {
        graph.add_service(name);
    }
    for edge in spec.edges() {
        graph.add_edge(&edge.dependent, &edge.dependency, edge.kind)?;
    }
    // Surfaces references to undeclared services.
    graph.topological_order()?;

    tracing::debug!(
        services = definitions.len(),
        edges = graph.edges().len(),
        "topology compiled"
    );

    Ok(Topology {
        name: spec.name.clone(),
        network: spec
            .network
            .clone()
            .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
        definitions,
        graph,
    })
}

impl Topology {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Definitions in declaration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.definitions.values()
    }

    pub fn definition(&self, name: &str) -> Option<&ServiceDefinition> {
        self.definitions.get(name)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Serialize back into the configuration format. Mount sources are
    /// written as resolved absolute paths and tags are folded into `image`.
    pub fn to_spec(&self) -> TopologySpec {
        let services = self
            .definitions
            .values()
            .map(|def| ServiceSpec {
                name: def.name().to_string(),
                image: def.image().to_string(),
                tag: None,
                endpoints: def.endpoints().to_vec(),
                env: def.env().clone(),
                mounts: def.mounts().to_vec(),
                args: def.args().to_vec(),
                lifetime: def.lifetime(),
                wait_for: self
                    .graph
                    .dependencies(def.name(), EdgeKind::WaitFor)
                    .into_iter()
                    .map(String::from)
                    .collect(),
                parent: self
                    .graph
                    .dependencies(def.name(), EdgeKind::ParentOf)
                    .first()
                    .map(|p| p.to_string()),
                readiness_timeout_secs: def.readiness_timeout().map(|d| d.as_secs()),
                health_cmd: def.health_cmd().map(String::from),
            })
            .collect();

        TopologySpec {
            name: self.name.clone(),
            network: Some(self.network.clone()),
            services,
        }
    }
}
