//! One reconciliation cycle.
//!
//! [`Reconciler::run_cycle`] is the whole pipeline:
//!
//! 1. Load the last committed snapshot (fatal if the backend is unreachable)
//! 2. Walk and resolve the source tree, isolating broken manifests
//! 3. Diff against the snapshot
//! 4. Build the plan
//! 5. Execute pending steps
//! 6. Build the next snapshot from the outcomes and commit it if it changed
//!
//! The snapshot is committed strictly after every issued step has reported.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ManifestFailure, ResolveError, RootConfig, ServiceKey, resolve_root, resolve_tree};
use crate::diff::{Action, compute_diff_with};
use crate::error::ErrorKind;
use crate::execute::{DeploymentExecutor, ExecutionResult, execute_plan};
use crate::plan::{Plan, PlanError, build_plan, commit_results};
use crate::state::{Snapshot, StateError, StateRepository};

/// Errors that end a cycle without a commit.
#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error("state error: {0}")]
  State(#[from] StateError),

  #[error("resolution error: {0}")]
  Resolve(#[from] ResolveError),

  #[error("planning error: {0}")]
  Plan(#[from] PlanError),

  /// Shutdown was requested before any step was issued.
  #[error("cycle interrupted before any deployment was issued")]
  Interrupted,
}

impl ReconcileError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ReconcileError::State(e) => e.kind(),
      ReconcileError::Resolve(e) => e.kind(),
      ReconcileError::Plan(e) => e.kind(),
      ReconcileError::Interrupted => ErrorKind::Execution,
    }
  }
}

/// Options for a cycle.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
  /// Maximum number of steps of one wave executed at once.
  pub parallelism: usize,

  /// Compute the plan but neither execute nor commit.
  pub dry_run: bool,
}

impl Default for ReconcileOptions {
  fn default() -> Self {
    Self {
      parallelism: 1,
      dry_run: false,
    }
  }
}

/// A manifest excluded from the cycle, in reportable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionWarning {
  pub path: PathBuf,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub service_key: Option<ServiceKey>,
  pub kind: ErrorKind,
  pub message: String,
}

impl From<&ManifestFailure> for ResolutionWarning {
  fn from(failure: &ManifestFailure) -> Self {
    Self {
      path: failure.path.clone(),
      service_key: failure.service_key.clone(),
      kind: failure.error.kind(),
      message: failure.error.to_string(),
    }
  }
}

/// The planning half of a cycle.
#[derive(Debug, Clone)]
pub struct CyclePlan {
  pub previous: Option<Snapshot>,
  pub plan: Plan,
  pub warnings: Vec<ResolutionWarning>,
}

/// Everything that happened in one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
  pub revision: String,
  pub plan: Plan,
  pub warnings: Vec<ResolutionWarning>,
  pub execution: ExecutionResult,

  /// The snapshot after this cycle (equal to the previous one when nothing deployed).
  pub snapshot: Snapshot,

  /// Whether a new snapshot was written.
  pub committed: bool,
}

impl CycleReport {
  /// Returns true if every pending step deployed.
  pub fn is_success(&self) -> bool {
    self.execution.is_success()
  }

  pub fn applied(&self) -> usize {
    self.count_succeeded(Action::Apply)
  }

  pub fn removed(&self) -> usize {
    self.count_succeeded(Action::Remove)
  }

  pub fn unchanged(&self) -> usize {
    self.plan.count(Action::Skip)
  }

  fn count_succeeded(&self, action: Action) -> usize {
    self
      .plan
      .pending()
      .filter(|s| s.action == action)
      .filter(|s| self.execution.outcomes.get(&s.service_key).is_some_and(|o| o.is_success()))
      .count()
  }
}

/// Drives reconciliation cycles against one state repository and executor.
pub struct Reconciler {
  state: StateRepository,
  executor: Arc<dyn DeploymentExecutor>,
  options: ReconcileOptions,
}

impl Reconciler {
  pub fn new(state: StateRepository, executor: Arc<dyn DeploymentExecutor>, options: ReconcileOptions) -> Self {
    Self {
      state,
      executor,
      options,
    }
  }

  pub fn state(&self) -> &StateRepository {
    &self.state
  }

  pub fn options(&self) -> &ReconcileOptions {
    &self.options
  }

  /// Load, resolve, diff and plan without side effects.
  ///
  /// # Errors
  ///
  /// Fails if the snapshot cannot be loaded, the tree root is unusable, or the
  /// dependency graph has a cycle.
  pub fn plan_cycle(&self, root: &RootConfig) -> Result<CyclePlan, ReconcileError> {
    let previous = self.state.load()?;
    info!(
      has_previous = previous.is_some(),
      revision = %root.git_ref,
      "starting reconciliation cycle"
    );

    let resolution = resolve_tree(root)?;
    let warnings: Vec<ResolutionWarning> = resolution.failures.iter().map(ResolutionWarning::from).collect();

    let diff = compute_diff_with(&resolution.artifacts, previous.as_ref(), |key| {
      resolution.is_excluded(key)
    });
    for key in &diff.excluded {
      warn!(service = %key, "manifest failed to resolve; keeping last applied state");
    }

    let plan = build_plan(&diff, &resolution.artifacts)?;
    info!(
      apply = plan.count(Action::Apply),
      remove = plan.count(Action::Remove),
      unchanged = plan.count(Action::Skip),
      excluded = plan.excluded.len(),
      "plan computed"
    );

    Ok(CyclePlan {
      previous,
      plan,
      warnings,
    })
  }

  /// Re-read the root config at `config_file`, then run one full cycle
  /// against it. A changed `ref` or `watchPath` takes effect on the next call.
  ///
  /// # Errors
  ///
  /// [`ReconcileError::Resolve`] if the root config cannot be loaded, plus
  /// everything [`Reconciler::run_cycle`] returns.
  pub async fn run_cycle_from(
    &self,
    config_file: &Path,
    shutdown: &Arc<AtomicBool>,
  ) -> Result<CycleReport, ReconcileError> {
    let root = resolve_root(config_file)?;
    self.run_cycle(&root, shutdown).await
  }

  /// Run one full cycle.
  ///
  /// If `shutdown` is set before any step has been issued, the cycle ends with
  /// [`ReconcileError::Interrupted`] and nothing is executed or committed. If
  /// it becomes set after execution started, running steps finish, the rest
  /// are skipped, and what did deploy is committed.
  ///
  /// # Errors
  ///
  /// See [`Reconciler::plan_cycle`]; also fails if the commit cannot be written.
  pub async fn run_cycle(&self, root: &RootConfig, shutdown: &Arc<AtomicBool>) -> Result<CycleReport, ReconcileError> {
    let CyclePlan {
      previous,
      plan,
      warnings,
    } = self.plan_cycle(root)?;

    let unchanged_snapshot = || previous.clone().unwrap_or_else(|| Snapshot::new(root.git_ref.clone()));

    if self.options.dry_run {
      info!("dry run - not executing plan");
      return Ok(CycleReport {
        revision: root.git_ref.clone(),
        snapshot: unchanged_snapshot(),
        plan,
        warnings,
        execution: ExecutionResult::default(),
        committed: false,
      });
    }

    let execution = if plan.is_noop() {
      debug!("no changes to apply");
      ExecutionResult::default()
    } else {
      execute_plan(&plan, self.executor.clone(), self.options.parallelism, shutdown).await
    };

    if execution.issued() == 0 && (execution.interrupted || shutdown.load(Ordering::SeqCst)) {
      warn!(
        skipped = execution.skipped(),
        "shutdown requested before any step was issued; nothing committed"
      );
      return Err(ReconcileError::Interrupted);
    }

    let next = commit_results(&plan, previous.as_ref(), &execution.outcomes, &root.git_ref);
    let committed = if previous.as_ref() == Some(&next) {
      debug!("snapshot unchanged; skipping commit");
      false
    } else {
      self.state.commit(&next)?;
      true
    };

    let report = CycleReport {
      revision: root.git_ref.clone(),
      plan,
      warnings,
      execution,
      snapshot: next,
      committed,
    };

    info!(
      applied = report.applied(),
      removed = report.removed(),
      unchanged = report.unchanged(),
      failed = report.execution.failed(),
      skipped = report.execution.skipped(),
      warnings = report.warnings.len(),
      committed = report.committed,
      "reconciliation cycle complete"
    );

    Ok(report)
  }
}
