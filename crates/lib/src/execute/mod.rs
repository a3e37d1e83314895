//! Plan execution.
//!
//! This module provides the [`DeploymentExecutor`] seam and the runner that
//! drives a [`Plan`] through it. It handles:
//! - wave-by-wave ordering, with bounded parallelism inside a wave
//! - skipping dependents of a service that did not deploy
//! - stopping issue of new steps once shutdown is requested

mod compose;
mod types;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ResolvedArtifact, ServiceKey};
use crate::diff::Action;
use crate::plan::{Plan, PlanStep};

pub use compose::ComposeExecutor;
pub use types::{ComposeConfig, ExecuteError, ExecutionResult, Outcome, SkipReason};

/// Performs deployments for plan steps.
///
/// Implementations report every failure as an [`Outcome`]; nothing here is
/// fatal for the cycle.
#[async_trait]
pub trait DeploymentExecutor: Send + Sync {
  /// Deploy (or redeploy) one service.
  async fn apply(&self, artifact: &ResolvedArtifact) -> Outcome;

  /// Tear down a service that no longer exists in the tree.
  async fn remove(&self, key: &ServiceKey) -> Outcome;
}

/// Execute the pending steps of `plan`.
///
/// Waves run strictly in order; up to `parallelism` steps of one wave run at
/// once. Once `shutdown` is set, steps already running finish and every step
/// not yet issued is recorded as [`SkipReason::Interrupted`].
pub async fn execute_plan(
  plan: &Plan,
  executor: Arc<dyn DeploymentExecutor>,
  parallelism: usize,
  shutdown: &Arc<AtomicBool>,
) -> ExecutionResult {
  let waves = plan.waves();
  info!(steps = plan.pending().count(), waves = waves.len(), "executing plan");

  let mut result = ExecutionResult::default();
  let mut not_deployed: BTreeSet<ServiceKey> = BTreeSet::new();
  let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));

  for (wave_idx, wave) in waves.iter().enumerate() {
    debug!(wave = wave_idx, steps = wave.len(), "executing wave");

    let mut ready = Vec::new();
    for step in wave {
      if shutdown.load(Ordering::SeqCst) {
        result.interrupted = true;
        result.outcomes.insert(
          step.service_key.clone(),
          Outcome::Skipped {
            reason: SkipReason::Interrupted,
          },
        );
        continue;
      }

      match step.depends_on.iter().find(|dep| not_deployed.contains(*dep)) {
        Some(dep) => {
          warn!(
            service = %step.service_key,
            failed_dep = %dep,
            "skipping service due to failed dependency"
          );
          result.outcomes.insert(
            step.service_key.clone(),
            Outcome::Skipped {
              reason: SkipReason::FailedDependency(dep.clone()),
            },
          );
        }
        None => ready.push(*step),
      }
    }

    if !ready.is_empty() {
      let outcomes = execute_wave(&ready, executor.clone(), semaphore.clone(), shutdown.clone()).await;
      for (key, outcome) in outcomes {
        if matches!(outcome, Outcome::Skipped { reason: SkipReason::Interrupted }) {
          result.interrupted = true;
        }
        result.outcomes.insert(key, outcome);
      }

      for step in &ready {
        if !result.outcomes.contains_key(&step.service_key) {
          error!(service = %step.service_key, "deployment task did not report an outcome");
          result
            .outcomes
            .insert(step.service_key.clone(), Outcome::failure("deployment task aborted"));
        }
      }
    }

    for step in wave {
      if !result.outcomes.get(&step.service_key).is_some_and(Outcome::is_success) {
        not_deployed.insert(step.service_key.clone());
      }
    }
  }

  info!(
    succeeded = result.succeeded(),
    failed = result.failed(),
    skipped = result.skipped(),
    interrupted = result.interrupted,
    "plan execution complete"
  );

  result
}

/// Execute one wave in parallel, bounded by `semaphore`.
async fn execute_wave(
  steps: &[&PlanStep],
  executor: Arc<dyn DeploymentExecutor>,
  semaphore: Arc<Semaphore>,
  shutdown: Arc<AtomicBool>,
) -> Vec<(ServiceKey, Outcome)> {
  let mut join_set = JoinSet::new();

  for step in steps {
    let key = step.service_key.clone();
    let action = step.action;
    let artifact = step.artifact.clone();
    let executor = executor.clone();
    let semaphore = semaphore.clone();
    let shutdown = shutdown.clone();

    join_set.spawn(async move {
      let Ok(_permit) = semaphore.acquire_owned().await else {
        return (key, Outcome::failure("executor pool closed"));
      };

      // Re-checked under the permit: with bounded parallelism a step may wait here
      // while shutdown is requested.
      if shutdown.load(Ordering::SeqCst) {
        return (
          key,
          Outcome::Skipped {
            reason: SkipReason::Interrupted,
          },
        );
      }

      let outcome = match (action, artifact) {
        (Action::Apply, Some(artifact)) => {
          info!(service = %key, "applying");
          executor.apply(&artifact).await
        }
        (Action::Remove, _) => {
          info!(service = %key, "removing");
          executor.remove(&key).await
        }
        (Action::Apply, None) => Outcome::failure("no resolved artifact for apply"),
        (Action::Skip, _) => Outcome::Success,
      };
      (key, outcome)
    });
  }

  let mut results = Vec::new();
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok(pair) => results.push(pair),
      Err(e) => error!(error = %e, "deployment task panicked"),
    }
  }
  results
}
