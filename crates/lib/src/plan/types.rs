//! Types for reconciliation plans.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::{ResolvedArtifact, ServiceKey};
use crate::diff::{Action, ChangeKind};
use crate::error::ErrorKind;

/// Errors that make a plan impossible to build.
#[derive(Debug, Error)]
pub enum PlanError {
  /// The `dependsOn` graph has a cycle through this service.
  #[error("dependency cycle detected involving service '{service}'")]
  CycleDetected { service: ServiceKey },
}

impl PlanError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      PlanError::CycleDetected { .. } => ErrorKind::Parse,
    }
  }
}

/// A `dependsOn` entry naming a service that does not exist this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownDependency {
  pub service: ServiceKey,
  pub missing: ServiceKey,
}

impl fmt::Display for UnknownDependency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "service '{}' depends on unknown service '{}'", self.service, self.missing)
  }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
  pub service_key: ServiceKey,
  pub action: Action,
  pub change: ChangeKind,

  /// Steps in the same wave have no dependency relation.
  pub wave: usize,

  /// Services in this plan that must deploy before this one.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<ServiceKey>,

  /// The artifact to deploy. `None` for `Remove`, whose artifact no longer resolves.
  #[serde(skip)]
  pub artifact: Option<ResolvedArtifact>,
}

/// The ordered set of steps for one cycle. Built fresh every cycle, never persisted.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Plan {
  pub steps: Vec<PlanStep>,

  /// Snapshot keys left untouched because their manifest failed to resolve.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub excluded: Vec<ServiceKey>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub unknown_dependencies: Vec<UnknownDependency>,
}

impl Plan {
  /// Steps that need the executor (everything except `Skip`), in plan order.
  pub fn pending(&self) -> impl Iterator<Item = &PlanStep> {
    self.steps.iter().filter(|s| s.action != Action::Skip)
  }

  /// Returns true if there is nothing to apply or remove.
  pub fn is_noop(&self) -> bool {
    self.pending().next().is_none()
  }

  pub fn step(&self, key: &ServiceKey) -> Option<&PlanStep> {
    self.steps.iter().find(|s| &s.service_key == key)
  }

  /// Number of steps with `action`.
  pub fn count(&self, action: Action) -> usize {
    self.steps.iter().filter(|s| s.action == action).count()
  }

  /// Pending steps grouped by wave, in wave order.
  pub fn waves(&self) -> Vec<Vec<&PlanStep>> {
    let mut waves: Vec<Vec<&PlanStep>> = Vec::new();
    for step in self.pending() {
      match waves.last_mut() {
        Some(wave) if wave.first().is_some_and(|s| s.wave == step.wave) => wave.push(step),
        _ => waves.push(vec![step]),
      }
    }
    waves
  }
}
