//! Reconciliation planning.
//!
//! Turns a [`StateDiff`] and the resolved artifacts into an ordered [`Plan`],
//! and turns execution outcomes back into the next [`Snapshot`](crate::state::Snapshot).
//!
//! Plan order is deterministic:
//! 1. every `Remove`, lexicographically, in wave 0
//! 2. the remaining steps wave by wave in dependency order, lexicographic within a wave

mod commit;
mod order;
mod types;

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{ResolvedArtifact, ServiceKey};
use crate::diff::{Action, ChangeKind, StateDiff};

pub use commit::commit_results;
pub use order::DependencyGraph;
pub use types::{Plan, PlanError, PlanStep, UnknownDependency};

/// Build the plan for one cycle.
///
/// `artifacts` are the services that resolved this cycle; every key in
/// `diff.changes` is expected to be either one of them or a `Removed` key.
///
/// # Errors
///
/// Returns `CycleDetected` if `dependsOn` declarations form a cycle.
pub fn build_plan(diff: &StateDiff, artifacts: &[ResolvedArtifact]) -> Result<Plan, PlanError> {
  let dag = DependencyGraph::from_artifacts(artifacts)?;
  let by_key: BTreeMap<&ServiceKey, &ResolvedArtifact> = artifacts.iter().map(|a| (&a.service_key, a)).collect();

  let mut plan = Plan {
    excluded: diff.excluded.clone(),
    unknown_dependencies: dag.unknown_dependencies().to_vec(),
    ..Default::default()
  };

  for (key, change) in &diff.changes {
    if *change == ChangeKind::Removed {
      plan.steps.push(PlanStep {
        service_key: key.clone(),
        action: Action::Remove,
        change: *change,
        wave: 0,
        depends_on: Vec::new(),
        artifact: None,
      });
    }
  }

  let offset = usize::from(!plan.steps.is_empty());

  for (wave_idx, wave) in dag.waves().into_iter().enumerate() {
    for key in wave {
      let change = diff.changes.get(&key).copied().unwrap_or(ChangeKind::Created);
      let artifact = by_key.get(&key).map(|a| (*a).clone());
      plan.steps.push(PlanStep {
        depends_on: dag.dependencies(&key),
        service_key: key,
        action: change.action(),
        change,
        wave: wave_idx + offset,
        artifact,
      });
    }
  }

  debug!(
    services = dag.len(),
    steps = plan.steps.len(),
    apply = plan.count(Action::Apply),
    remove = plan.count(Action::Remove),
    skip = plan.count(Action::Skip),
    "plan built"
  );

  Ok(plan)
}
