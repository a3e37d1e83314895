//! Dependency ordering between services.
//!
//! Services form a directed graph from each dependency to its dependents.
//! Waves are computed with Kahn's algorithm; within a wave keys are ordered
//! lexicographically, so without any `dependsOn` the whole plan is one wave in
//! plain key order.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::warn;

use crate::config::{ResolvedArtifact, ServiceKey};

use super::types::{PlanError, UnknownDependency};

pub struct DependencyGraph {
  graph: DiGraph<ServiceKey, ()>,
  nodes: BTreeMap<ServiceKey, NodeIndex>,
  unknown: Vec<UnknownDependency>,
}

impl DependencyGraph {
  /// Build the graph over every resolved artifact.
  ///
  /// A dependency on a key that did not resolve this cycle is dropped and
  /// recorded in [`Self::unknown_dependencies`].
  ///
  /// # Errors
  ///
  /// Returns `CycleDetected` if the dependencies form a cycle (a service
  /// depending on itself included).
  pub fn from_artifacts(artifacts: &[ResolvedArtifact]) -> Result<Self, PlanError> {
    let mut graph = DiGraph::new();
    let mut nodes = BTreeMap::new();
    let mut unknown = Vec::new();

    for artifact in artifacts {
      let idx = graph.add_node(artifact.service_key.clone());
      nodes.insert(artifact.service_key.clone(), idx);
    }

    for artifact in artifacts {
      let dependent = nodes[&artifact.service_key];
      let deps: BTreeSet<&ServiceKey> = artifact.depends_on.iter().collect();

      for dep in deps {
        match nodes.get(dep) {
          Some(&dep_idx) => {
            graph.add_edge(dep_idx, dependent, ());
          }
          None => {
            warn!(
              service = %artifact.service_key,
              dependency = %dep,
              "ignoring dependency on unknown service"
            );
            unknown.push(UnknownDependency {
              service: artifact.service_key.clone(),
              missing: dep.clone(),
            });
          }
        }
      }
    }

    let dag = Self { graph, nodes, unknown };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), PlanError> {
    toposort(&self.graph, None).map_err(|cycle| PlanError::CycleDetected {
      service: self.graph[cycle.node_id()].clone(),
    })?;
    Ok(())
  }

  /// Services grouped into waves; every dependency of a wave-`n` service is in
  /// a wave before `n`.
  pub fn waves(&self) -> Vec<Vec<ServiceKey>> {
    let mut in_degree: BTreeMap<&ServiceKey, usize> = self
      .nodes
      .iter()
      .map(|(key, &idx)| (key, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();

    let mut waves = Vec::new();
    let mut remaining: BTreeSet<&ServiceKey> = self.nodes.keys().collect();

    while !remaining.is_empty() {
      let ready: Vec<&ServiceKey> = remaining.iter().filter(|k| in_degree[*k] == 0).copied().collect();

      // verify_acyclic ran at construction, so this only guards against looping forever.
      if ready.is_empty() {
        break;
      }

      for key in &ready {
        remaining.remove(key);
        for neighbor in self.graph.neighbors_directed(self.nodes[*key], Direction::Outgoing) {
          if let Some(deg) = in_degree.get_mut(&self.graph[neighbor]) {
            *deg = deg.saturating_sub(1);
          }
        }
      }

      waves.push(ready.into_iter().cloned().collect());
    }

    waves
  }

  /// Direct dependencies of `key` that are part of this graph, sorted.
  pub fn dependencies(&self, key: &ServiceKey) -> Vec<ServiceKey> {
    let Some(&idx) = self.nodes.get(key) else {
      return Vec::new();
    };

    let deps: BTreeSet<ServiceKey> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].clone())
      .collect();
    deps.into_iter().collect()
  }

  pub fn unknown_dependencies(&self) -> &[UnknownDependency] {
    &self.unknown
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}
