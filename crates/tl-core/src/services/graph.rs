//! Dependency graph between services and topological ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;

use crate::error::{LauncherError, Result};
use crate::models::{DependencyEdge, EdgeKind};

/// Directed graph of `dependent -> dependency` edges over service names.
///
/// Acyclic by construction: [`DependencyGraph::add_edge`] refuses any edge
/// that would close a cycle. Edges may name services that have not been
/// declared yet; [`DependencyGraph::topological_order`] reports those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    services: IndexSet<String>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a service node. Declaring twice is a no-op.
    pub fn add_service(&mut self, name: &str) {
        if !self.services.contains(name) {
            self.services.insert(name.to_string());
        }
    }

    /// Add `dependent -> dependency`. Fails with [`LauncherError::Cycle`]
    /// if `dependency` already (transitively) depends on `dependent`.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str, kind: EdgeKind) -> Result<()> {
        if dependent == dependency {
            return Err(LauncherError::Cycle(vec![
                dependent.to_string(),
                dependency.to_string(),
            ]));
        }

        let exists = self
            .edges
            .iter()
            .any(|e| e.dependent == dependent && e.dependency == dependency && e.kind == kind);
        if exists {
            return Ok(());
        }

        if let Some(path) = self.find_path(dependency, dependent) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(dependent.to_string());
            cycle.extend(path);
            return Err(LauncherError::Cycle(cycle));
        }

        self.edges.push(DependencyEdge {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
            kind,
        });
        Ok(())
    }

    /// Depth-first search along dependency edges. Returns the path
    /// `from, .., to` if `to` is reachable.
    fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, Vec<String>)> = vec![(from, vec![from.to_string()])];

        while let Some((node, path)) = stack.pop() {
            if node == to {
                return Some(path);
            }
            if !visited.insert(node) {
                continue;
            }
            for edge in self.edges.iter().filter(|e| e.dependent == node) {
                if !visited.contains(edge.dependency.as_str()) {
                    let mut next = path.clone();
                    next.push(edge.dependency.clone());
                    stack.push((edge.dependency.as_str(), next));
                }
            }
        }
        None
    }

    /// Service names such that every dependency precedes its dependents.
    ///
    /// Both edge kinds order the result. Ties keep declaration order.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        for edge in &self.edges {
            if !self.services.contains(&edge.dependency) {
                return Err(LauncherError::UnknownService {
                    service: edge.dependency.clone(),
                    referenced_by: edge.dependent.clone(),
                });
            }
            if !self.services.contains(&edge.dependent) {
                return Err(LauncherError::UnknownService {
                    service: edge.dependent.clone(),
                    referenced_by: edge.dependency.clone(),
                });
            }
        }

        // Kahn's algorithm
        let mut in_degree: HashMap<&str, usize> =
            self.services.iter().map(|s| (s.as_str(), 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            *in_degree.entry(edge.dependent.as_str()).or_insert(0) += 1;
            dependents
                .entry(edge.dependency.as_str())
                .or_default()
                .push(edge.dependent.as_str());
        }

        let mut queue: VecDeque<&str> = self
            .services
            .iter()
            .map(|s| s.as_str())
            .filter(|s| in_degree.get(s) == Some(&0))
            .collect();

        let mut sorted = Vec::with_capacity(self.services.len());
        while let Some(name) = queue.pop_front() {
            sorted.push(name.to_string());
            if let Some(deps) = dependents.get(name) {
                for &dep in deps {
                    if let Some(degree) = in_degree.get_mut(dep) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dep);
                        }
                    }
                }
            }
        }

        if sorted.len() != self.services.len() {
            let placed: HashSet<&str> = sorted.iter().map(|s| s.as_str()).collect();
            let remaining = self
                .services
                .iter()
                .filter(|s| !placed.contains(s.as_str()))
                .cloned()
                .collect();
            return Err(LauncherError::Cycle(remaining));
        }

        Ok(sorted)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains(name)
    }

    /// Declared services, in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| s.as_str())
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Direct dependencies of `name` by `kind`.
    pub fn dependencies(&self, name: &str, kind: EdgeKind) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.dependent == name && e.kind == kind)
            .map(|e| e.dependency.as_str())
            .collect()
    }

    /// Services that directly depend on `name` by `kind`.
    pub fn dependents(&self, name: &str, kind: EdgeKind) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.dependency == name && e.kind == kind)
            .map(|e| e.dependent.as_str())
            .collect()
    }

    /// Everything that depends on `name` through a chain of `kind` edges,
    /// nearest first.
    pub fn transitive_dependents(&self, name: &str, kind: EdgeKind) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current, kind) {
                if seen.insert(dependent) {
                    order.push(dependent.to_string());
                    queue.push_back(dependent);
                }
            }
        }
        order
    }

    /// Services grouped directly under `name`.
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.dependents(name, EdgeKind::ParentOf)
    }
}
