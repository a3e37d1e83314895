use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::hash::Fingerprint;

/// Identity of one service across cycles.
///
/// Derived from the manifest path relative to the watch directory, with the
/// manifest suffix removed and `/` as separator on every platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(pub String);

impl ServiceKey {
  pub fn new(key: impl Into<String>) -> Self {
    ServiceKey(key.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Borrow<str> for ServiceKey {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl From<&str> for ServiceKey {
  fn from(key: &str) -> Self {
    ServiceKey(key.to_string())
  }
}

/// The top-level control-plane descriptor.
///
/// # Example
///
/// ```yaml
/// configFilePath: pannugit.yaml
/// ref: main
/// watchPath: services
/// storePath: /srv/pannugit/org/example
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootConfig {
  /// Where this document was loaded from. Informational only.
  #[serde(default)]
  pub config_file_path: PathBuf,

  /// Source revision the configuration was resolved at.
  #[serde(rename = "ref", default)]
  pub git_ref: String,

  /// Directory searched for service manifests, relative to `store_path`.
  #[serde(default)]
  pub watch_path: PathBuf,

  /// Base directory of the materialized source tree.
  #[serde(default)]
  pub store_path: PathBuf,
}

impl RootConfig {
  /// Absolute directory that is walked for manifests.
  pub fn watch_dir(&self) -> PathBuf {
    self.store_path.join(&self.watch_path)
  }
}

/// One discovered per-service descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceManifest {
  /// Location of the manifest file. Unique within a cycle.
  pub manifest_path: PathBuf,

  /// Key derived from `manifest_path`.
  pub service_key: ServiceKey,

  /// Artifact document, relative to the manifest's directory.
  pub override_ref: PathBuf,

  /// Services that must be applied before this one.
  pub depends_on: Vec<ServiceKey>,
}

impl ServiceManifest {
  /// Directory the manifest lives in; `override_ref` is resolved against it.
  pub fn dir(&self) -> &Path {
    self.manifest_path.parent().unwrap_or_else(|| Path::new("."))
  }
}

/// The fully resolved, deployable description of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
  pub service_key: ServiceKey,

  /// Manifest this artifact was resolved from.
  pub manifest_path: PathBuf,

  /// Location of the override / compose document.
  pub artifact_path: PathBuf,

  /// Raw bytes of the document.
  pub content: Vec<u8>,

  /// Pure function of `service_key` and `content`.
  pub fingerprint: Fingerprint,

  /// Carried over from the manifest for plan ordering.
  pub depends_on: Vec<ServiceKey>,
}

impl ResolvedArtifact {
  /// Build an artifact from its parts, computing the fingerprint.
  pub fn new(service_key: ServiceKey, manifest_path: PathBuf, artifact_path: PathBuf, content: Vec<u8>) -> Self {
    let fingerprint = Fingerprint::compute(service_key.as_str(), &content);
    Self {
      service_key,
      manifest_path,
      artifact_path,
      content,
      fingerprint,
      depends_on: Vec::new(),
    }
  }

  /// Directory the orchestration tool should run in.
  pub fn working_dir(&self) -> &Path {
    self.artifact_path.parent().unwrap_or_else(|| Path::new("."))
  }
}
