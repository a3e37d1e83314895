//! Building the next snapshot from execution outcomes.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ServiceKey;
use crate::diff::Action;
use crate::execute::Outcome;
use crate::state::Snapshot;

use super::types::Plan;

/// Compute the snapshot that reflects what actually deployed.
///
/// Starts from `previous`, drops keys whose `Remove` succeeded, upserts keys
/// whose `Apply` succeeded, and leaves every other entry exactly as it was.
/// Steps without an outcome count as not executed.
pub fn commit_results(
  plan: &Plan,
  previous: Option<&Snapshot>,
  outcomes: &BTreeMap<ServiceKey, Outcome>,
  revision: &str,
) -> Snapshot {
  let mut next = Snapshot::new(revision);
  if let Some(previous) = previous {
    next.entries = previous.entries.clone();
  }

  for step in plan.pending() {
    if !outcomes.get(&step.service_key).is_some_and(Outcome::is_success) {
      continue;
    }

    match (step.action, &step.artifact) {
      (Action::Remove, _) => {
        debug!(service = %step.service_key, "dropping snapshot entry");
        next.entries.remove(&step.service_key);
      }
      (Action::Apply, Some(artifact)) => {
        debug!(service = %step.service_key, fingerprint = %artifact.fingerprint.short(), "recording snapshot entry");
        next
          .entries
          .insert(step.service_key.clone(), artifact.fingerprint.clone());
      }
      (Action::Apply, None) | (Action::Skip, _) => {}
    }
  }

  next
}
