//! Change detection between resolved artifacts and the last snapshot.
//!
//! Identity is the service key; change is exact fingerprint inequality. Any
//! byte-level change to an artifact, whitespace included, counts as a change.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::{ResolvedArtifact, ServiceKey};
use crate::state::Snapshot;

/// What the executor should do for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Skip,
  Apply,
  Remove,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Action::Skip => "skip",
      Action::Apply => "apply",
      Action::Remove => "remove",
    };
    f.write_str(s)
  }
}

/// Why a service got its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
  /// Same fingerprint as the snapshot.
  Unchanged,
  /// Not in the snapshot.
  Created,
  /// In the snapshot with a different fingerprint.
  Updated,
  /// In the snapshot, no longer in the source tree.
  Removed,
}

impl ChangeKind {
  pub fn action(self) -> Action {
    match self {
      ChangeKind::Unchanged => Action::Skip,
      ChangeKind::Created | ChangeKind::Updated => Action::Apply,
      ChangeKind::Removed => Action::Remove,
    }
  }
}

impl fmt::Display for ChangeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ChangeKind::Unchanged => "unchanged",
      ChangeKind::Created => "created",
      ChangeKind::Updated => "updated",
      ChangeKind::Removed => "removed",
    };
    f.write_str(s)
  }
}

/// Per-service classification for one cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateDiff {
  pub changes: BTreeMap<ServiceKey, ChangeKind>,

  /// Snapshot keys that are absent from the tree only because their manifest
  /// failed to resolve. They get no action and keep their entry.
  pub excluded: Vec<ServiceKey>,
}

impl StateDiff {
  /// Returns true if there is nothing to apply or remove.
  pub fn is_empty(&self) -> bool {
    self.changes.values().all(|k| *k == ChangeKind::Unchanged)
  }

  /// Number of services classified as `kind`.
  pub fn count(&self, kind: ChangeKind) -> usize {
    self.changes.values().filter(|k| **k == kind).count()
  }

  /// The action for every classified service.
  pub fn actions(&self) -> BTreeMap<ServiceKey, Action> {
    self.changes.iter().map(|(k, c)| (k.clone(), c.action())).collect()
  }
}

/// Compute the diff between current artifacts and the previous snapshot.
///
/// - in `current`, not in `previous` → `Created`
/// - in both, different fingerprint → `Updated`
/// - in both, same fingerprint → `Unchanged`
/// - in `previous`, not in `current` → `Removed`
pub fn compute_diff(current: &[ResolvedArtifact], previous: Option<&Snapshot>) -> StateDiff {
  compute_diff_with(current, previous, |_| false)
}

/// Like [`compute_diff`], but previous keys for which `is_excluded` returns
/// true are never classified as `Removed`.
pub fn compute_diff_with<F>(current: &[ResolvedArtifact], previous: Option<&Snapshot>, is_excluded: F) -> StateDiff
where
  F: Fn(&ServiceKey) -> bool,
{
  let mut diff = StateDiff::default();

  for artifact in current {
    let kind = match previous.and_then(|s| s.fingerprint(&artifact.service_key)) {
      None => ChangeKind::Created,
      Some(fp) if *fp == artifact.fingerprint => ChangeKind::Unchanged,
      Some(_) => ChangeKind::Updated,
    };
    diff.changes.insert(artifact.service_key.clone(), kind);
  }

  if let Some(previous) = previous {
    for key in previous.entries.keys() {
      if diff.changes.contains_key(key) {
        continue;
      }
      if is_excluded(key) {
        diff.excluded.push(key.clone());
      } else {
        diff.changes.insert(key.clone(), ChangeKind::Removed);
      }
    }
  }

  diff
}
