use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ServiceKey;
use crate::consts::SNAPSHOT_VERSION;
use crate::util::hash::Fingerprint;

/// The last successfully applied fingerprint per service.
///
/// `entries` only ever holds fingerprints of deployments that succeeded.
/// Uses [`BTreeMap`] so the serialized blob is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  /// Blob format version.
  pub version: u32,

  /// Source revision this snapshot was produced from.
  pub revision: String,

  pub entries: BTreeMap<ServiceKey, Fingerprint>,
}

impl Snapshot {
  pub fn new(revision: impl Into<String>) -> Self {
    Self {
      version: SNAPSHOT_VERSION,
      revision: revision.into(),
      entries: BTreeMap::new(),
    }
  }

  /// Fingerprint recorded for `key`, if any.
  pub fn fingerprint(&self, key: &ServiceKey) -> Option<&Fingerprint> {
    self.entries.get(key)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
