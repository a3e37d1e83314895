use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::MANIFEST_SUFFIX;
use crate::error::ErrorKind;
use crate::source::{ManifestSource, SourceError};

use super::types::{ResolvedArtifact, RootConfig, ServiceKey, ServiceManifest};

/// Errors that can occur while resolving configuration documents.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A document or directory that should exist does not.
  #[error("not found: {}", path.display())]
  NotFound { path: PathBuf },

  /// A document could not be parsed.
  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  /// A document could not be read.
  #[error("failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A path field holds a value that cannot be used.
  #[error("invalid {field} in {}: {reason}", path.display())]
  InvalidPath {
    path: PathBuf,
    field: &'static str,
    reason: String,
  },

  /// Two manifests map to the same service key.
  #[error("duplicate service '{key}': {} conflicts with {}", second.display(), first.display())]
  DuplicateService {
    key: ServiceKey,
    first: PathBuf,
    second: PathBuf,
  },

  /// Manifest discovery failed.
  #[error(transparent)]
  Source(#[from] SourceError),
}

impl ResolveError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ResolveError::NotFound { .. } => ErrorKind::NotFound,
      ResolveError::Parse { .. } | ResolveError::InvalidPath { .. } | ResolveError::DuplicateService { .. } => {
        ErrorKind::Parse
      }
      ResolveError::Io { .. } => ErrorKind::Io,
      ResolveError::Source(e) => e.kind(),
    }
  }

  fn read(path: &Path, source: io::Error) -> Self {
    if source.kind() == io::ErrorKind::NotFound {
      ResolveError::NotFound {
        path: path.to_path_buf(),
      }
    } else {
      ResolveError::Io {
        path: path.to_path_buf(),
        source,
      }
    }
  }
}

/// Service manifest document as written by users.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDocument {
  #[serde(rename = "override")]
  override_ref: PathBuf,
  #[serde(default)]
  depends_on: Vec<ServiceKey>,
}

/// Load and normalize the root configuration at `path`.
///
/// - An empty `storePath` defaults to the directory holding `path`; a relative
///   one is joined onto that directory.
/// - An empty `configFilePath` is set to `path`.
/// - `watchPath` must be relative and stay below `storePath`.
/// - `storePath` must exist and be readable.
///
/// # Errors
///
/// `NotFound` if the document or the store directory is missing, `Parse` on
/// malformed YAML or invalid paths, `Io` on read failures.
pub fn resolve_root(path: &Path) -> Result<RootConfig, ResolveError> {
  let content = fs::read_to_string(path).map_err(|e| ResolveError::read(path, e))?;
  let mut config: RootConfig = serde_yaml::from_str(&content).map_err(|e| ResolveError::Parse {
    path: path.to_path_buf(),
    source: e,
  })?;

  let base = match path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => dir,
    _ => Path::new("."),
  };
  if config.store_path.as_os_str().is_empty() {
    config.store_path = base.to_path_buf();
  } else if config.store_path.is_relative() {
    config.store_path = base.join(&config.store_path);
  }
  if config.config_file_path.as_os_str().is_empty() {
    config.config_file_path = path.to_path_buf();
  }

  validate_root(&mut config, path)?;

  info!(
    config = %path.display(),
    git_ref = %config.git_ref,
    store = %config.store_path.display(),
    watch = %config.watch_path.display(),
    "resolved root config"
  );
  Ok(config)
}

/// Check the invariants of a root config and canonicalize its store path.
///
/// `origin` names the document in error messages.
fn validate_root(config: &mut RootConfig, origin: &Path) -> Result<(), ResolveError> {
  if config.watch_path.is_absolute()
    || config
      .watch_path
      .components()
      .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
  {
    return Err(ResolveError::InvalidPath {
      path: origin.to_path_buf(),
      field: "watchPath",
      reason: format!("'{}' must be a relative path below storePath", config.watch_path.display()),
    });
  }

  let store = &config.store_path;
  if !store.exists() {
    return Err(ResolveError::NotFound { path: store.clone() });
  }
  fs::read_dir(store).map_err(|e| ResolveError::read(store, e))?;
  config.store_path = dunce::canonicalize(store).map_err(|e| ResolveError::read(store, e))?;
  Ok(())
}

/// Derive the service key of `manifest_path` relative to `watch_dir`.
///
/// `a/svc.pannugit.yaml` becomes `a/svc`; `a/.pannugit.yaml` becomes `a`;
/// a bare `.pannugit.yaml` at the watch root becomes `.`.
///
/// # Errors
///
/// `InvalidPath` if the manifest is outside `watch_dir`, is not a manifest,
/// or is not valid UTF-8.
pub fn service_key(watch_dir: &Path, manifest_path: &Path) -> Result<ServiceKey, ResolveError> {
  let invalid = |reason: &str| ResolveError::InvalidPath {
    path: manifest_path.to_path_buf(),
    field: "manifest path",
    reason: reason.to_string(),
  };

  let rel = manifest_path
    .strip_prefix(watch_dir)
    .map_err(|_| invalid("outside the watch directory"))?;

  let mut parts = Vec::new();
  for component in rel.components() {
    match component {
      Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| invalid("not valid UTF-8"))?),
      Component::CurDir => {}
      _ => return Err(invalid("unexpected path component")),
    }
  }

  let file = parts.pop().ok_or_else(|| invalid("empty path"))?;
  let stem = file
    .strip_suffix(MANIFEST_SUFFIX)
    .ok_or_else(|| invalid("missing manifest suffix"))?;
  if !stem.is_empty() {
    parts.push(stem);
  }

  if parts.is_empty() {
    Ok(ServiceKey::new("."))
  } else {
    Ok(ServiceKey::new(parts.join("/")))
  }
}

/// Load one service manifest.
///
/// # Errors
///
/// `NotFound`/`Io` on read failures, `Parse` on malformed YAML or an empty
/// or absolute `override`, `InvalidPath` if the key cannot be derived.
pub fn resolve_service_manifest(path: &Path, watch_dir: &Path) -> Result<ServiceManifest, ResolveError> {
  let service_key = service_key(watch_dir, path)?;
  let content = fs::read_to_string(path).map_err(|e| ResolveError::read(path, e))?;
  let doc: ServiceDocument = serde_yaml::from_str(&content).map_err(|e| ResolveError::Parse {
    path: path.to_path_buf(),
    source: e,
  })?;

  if doc.override_ref.as_os_str().is_empty() {
    return Err(ResolveError::InvalidPath {
      path: path.to_path_buf(),
      field: "override",
      reason: "must not be empty".to_string(),
    });
  }
  if doc.override_ref.is_absolute() {
    return Err(ResolveError::InvalidPath {
      path: path.to_path_buf(),
      field: "override",
      reason: format!(
        "'{}' must be relative to the manifest directory",
        doc.override_ref.display()
      ),
    });
  }

  debug!(manifest = %path.display(), service = %service_key, "resolved service manifest");
  Ok(ServiceManifest {
    manifest_path: path.to_path_buf(),
    service_key,
    override_ref: doc.override_ref,
    depends_on: doc.depends_on,
  })
}

/// Read the override document a manifest points at and fingerprint it.
///
/// # Errors
///
/// `NotFound` if the override target is missing, `Io` on read failure.
pub fn resolve_artifact(manifest: &ServiceManifest) -> Result<ResolvedArtifact, ResolveError> {
  let artifact_path = manifest.dir().join(&manifest.override_ref);
  let content = fs::read(&artifact_path).map_err(|e| ResolveError::read(&artifact_path, e))?;

  let mut artifact = ResolvedArtifact::new(
    manifest.service_key.clone(),
    manifest.manifest_path.clone(),
    artifact_path,
    content,
  );
  artifact.depends_on = manifest.depends_on.clone();

  debug!(
    service = %artifact.service_key,
    artifact = %artifact.artifact_path.display(),
    fingerprint = %artifact.fingerprint.short(),
    "resolved artifact"
  );
  Ok(artifact)
}

/// A manifest (or directory of manifests) that could not be resolved this cycle.
#[derive(Debug)]
pub struct ManifestFailure {
  /// Path of the manifest or unreadable directory.
  pub path: PathBuf,

  /// Key of the affected service when one could be derived.
  pub service_key: Option<ServiceKey>,

  /// For unreadable directories: every key under this prefix is affected.
  pub key_prefix: Option<String>,

  pub error: ResolveError,
}

impl ManifestFailure {
  /// Whether this failure hides the state of `key`.
  pub fn covers(&self, key: &ServiceKey) -> bool {
    if self.service_key.as_ref() == Some(key) {
      return true;
    }
    match &self.key_prefix {
      Some(prefix) if prefix.is_empty() => true,
      Some(prefix) => {
        key.as_str() == prefix
          || key
            .as_str()
            .strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
      }
      None => false,
    }
  }
}

/// Everything resolved from one walk of the source tree.
#[derive(Debug, Default)]
pub struct Resolution {
  /// Successfully resolved artifacts, ordered by service key.
  pub artifacts: Vec<ResolvedArtifact>,

  /// Manifests excluded from this cycle.
  pub failures: Vec<ManifestFailure>,
}

impl Resolution {
  /// Whether `key` must be left untouched because its manifest failed to resolve.
  pub fn is_excluded(&self, key: &ServiceKey) -> bool {
    self.failures.iter().any(|f| f.covers(key))
  }
}

/// Discover and resolve every service manifest under the root's watch path.
///
/// Per-manifest failures are collected into [`Resolution::failures`] and do
/// not stop the walk. Failures that make the whole tree unusable are returned
/// as errors.
///
/// # Errors
///
/// `NotFound` if `storePath` or the watch directory is missing; `Io` if the
/// store directory cannot be read.
pub fn resolve_tree(root: &RootConfig) -> Result<Resolution, ResolveError> {
  let mut root = root.clone();
  let origin = root.config_file_path.clone();
  validate_root(&mut root, &origin)?;

  let source = ManifestSource::open(&root.store_path, &root.watch_path)?;
  let watch_dir = source.root().to_path_buf();

  let mut seen: BTreeMap<ServiceKey, PathBuf> = BTreeMap::new();
  let mut duplicates: BTreeSet<ServiceKey> = BTreeSet::new();
  let mut artifacts = Vec::new();
  let mut failures = Vec::new();

  for item in source.walk() {
    let manifest_path = match item {
      Ok(path) => path,
      Err(err) => {
        let (path, key_prefix) = match &err {
          SourceError::Unreadable { path, .. } => (path.clone(), relative_prefix(&watch_dir, path)),
          _ => (watch_dir.clone(), Some(String::new())),
        };
        warn!(path = %path.display(), error = %err, "excluding unreadable part of the tree");
        failures.push(ManifestFailure {
          path,
          service_key: None,
          key_prefix,
          error: err.into(),
        });
        continue;
      }
    };

    let resolved = resolve_service_manifest(&manifest_path, &watch_dir).and_then(|manifest| {
      if let Some(first) = seen.get(&manifest.service_key) {
        return Err(ResolveError::DuplicateService {
          key: manifest.service_key.clone(),
          first: first.clone(),
          second: manifest_path.clone(),
        });
      }
      seen.insert(manifest.service_key.clone(), manifest_path.clone());
      resolve_artifact(&manifest)
    });

    match resolved {
      Ok(artifact) => artifacts.push(artifact),
      Err(error) => {
        let key = match &error {
          ResolveError::DuplicateService { key, .. } => {
            duplicates.insert(key.clone());
            Some(key.clone())
          }
          _ => service_key(&watch_dir, &manifest_path).ok(),
        };
        warn!(
          manifest = %manifest_path.display(),
          kind = %error.kind(),
          error = %error,
          "excluding service from this cycle"
        );
        failures.push(ManifestFailure {
          path: manifest_path,
          service_key: key,
          key_prefix: None,
          error,
        });
      }
    }
  }

  // A duplicated key is ambiguous; none of its manifests deploy.
  artifacts.retain(|a| !duplicates.contains(&a.service_key));
  artifacts.sort_by(|a, b| a.service_key.cmp(&b.service_key));

  info!(
    artifacts = artifacts.len(),
    failures = failures.len(),
    "resolved source tree"
  );
  Ok(Resolution { artifacts, failures })
}

/// Key prefix covering everything below `path`, or `None` if it is outside the tree.
fn relative_prefix(watch_dir: &Path, path: &Path) -> Option<String> {
  let rel = path.strip_prefix(watch_dir).ok()?;
  let parts: Vec<_> = rel
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect();
  Some(parts.join("/"))
}
