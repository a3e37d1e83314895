//! Types for plan execution.
//!
//! This module defines the per-step outcome, the error type for a single
//! external invocation, and the configuration of the compose executor.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceKey;
use crate::error::ErrorKind;

/// Why a step was never issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "service")]
pub enum SkipReason {
  /// A service this one depends on failed or was itself skipped.
  FailedDependency(ServiceKey),
  /// Shutdown was requested before the step was issued.
  Interrupted,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::FailedDependency(key) => write!(f, "dependency '{key}' did not deploy"),
      SkipReason::Interrupted => f.write_str("shutdown requested"),
    }
  }
}

/// Result of one apply or remove.
///
/// Outcomes are authoritative: only `Success` advances the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Outcome {
  Success,
  Failure { reason: String },
  Skipped { reason: SkipReason },
}

impl Outcome {
  pub fn failure(reason: impl fmt::Display) -> Self {
    Outcome::Failure {
      reason: reason.to_string(),
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, Outcome::Success)
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, Outcome::Failure { .. })
  }

  pub fn is_skipped(&self) -> bool {
    matches!(self, Outcome::Skipped { .. })
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Outcome::Success => f.write_str("success"),
      Outcome::Failure { reason } => write!(f, "failed: {reason}"),
      Outcome::Skipped { reason } => write!(f, "skipped: {reason}"),
    }
  }
}

/// Errors from a single external invocation.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// The tool could not be started at all.
  #[error("failed to run '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The tool ran and exited non-zero.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },
}

impl ExecuteError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ExecuteError::Spawn { .. } => ErrorKind::Unavailable,
      ExecuteError::CmdFailed { .. } => ErrorKind::Execution,
    }
  }
}

/// Outcomes of every issued (or deliberately unissued) step of a plan.
#[derive(Debug, Default, Clone)]
pub struct ExecutionResult {
  pub outcomes: BTreeMap<ServiceKey, Outcome>,

  /// True if a shutdown request stopped further steps from being issued.
  pub interrupted: bool,
}

impl ExecutionResult {
  /// Returns true if no step failed or was skipped.
  pub fn is_success(&self) -> bool {
    self.outcomes.values().all(Outcome::is_success)
  }

  pub fn succeeded(&self) -> usize {
    self.outcomes.values().filter(|o| o.is_success()).count()
  }

  pub fn failed(&self) -> usize {
    self.outcomes.values().filter(|o| o.is_failure()).count()
  }

  pub fn skipped(&self) -> usize {
    self.outcomes.values().filter(|o| o.is_skipped()).count()
  }

  /// Number of steps handed to the executor, whatever their result.
  pub fn issued(&self) -> usize {
    self.succeeded() + self.failed()
  }
}

/// How to invoke the compose tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeConfig {
  /// Program to run.
  pub program: String,

  /// Arguments placed before the compose subcommand (e.g. `compose` for `docker compose`).
  pub args: Vec<String>,

  /// Run `pull` before `up -d`.
  pub pull: bool,
}

impl ComposeConfig {
  /// Split a command line such as `docker compose` into program and leading args.
  ///
  /// Returns `None` for an empty command.
  pub fn from_command(command: &str, pull: bool) -> Option<Self> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some(Self {
      program,
      args: parts.collect(),
      pull,
    })
  }

  /// The command line as typed, for logs and errors.
  pub fn display(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

impl Default for ComposeConfig {
  fn default() -> Self {
    Self {
      program: "docker".to_string(),
      args: vec!["compose".to_string()],
      pull: false,
    }
  }
}
