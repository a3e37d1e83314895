use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{RootConfig, ServiceKey};
use crate::consts::{ROOT_CONFIG_KEY, SNAPSHOT_KEY, SNAPSHOT_VERSION};
use crate::error::ErrorKind;

use super::kv::{KvError, KvStore, open_store};
use super::types::Snapshot;

/// Errors from the state repository.
#[derive(Debug, Error)]
pub enum StateError {
  #[error(transparent)]
  Kv(#[from] KvError),

  /// A stored blob could not be decoded.
  #[error("stored value under '{key}' is corrupt: {source}")]
  Parse {
    key: &'static str,
    #[source]
    source: serde_json::Error,
  },

  /// A value could not be encoded.
  #[error("failed to serialize '{key}': {source}")]
  Serialize {
    key: &'static str,
    #[source]
    source: serde_json::Error,
  },

  /// The stored snapshot was written by an incompatible version.
  #[error("unsupported snapshot version: {0}")]
  UnsupportedVersion(u32),

  /// A stored fingerprint is not a hex SHA-256 digest.
  #[error("stored value under '{key}' is corrupt: malformed fingerprint for service '{service}'")]
  MalformedFingerprint { key: &'static str, service: ServiceKey },
}

impl StateError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      StateError::Kv(e) => e.kind(),
      StateError::Parse { .. }
      | StateError::Serialize { .. }
      | StateError::UnsupportedVersion(_)
      | StateError::MalformedFingerprint { .. } => ErrorKind::Parse,
    }
  }
}

/// Persistence of the last-applied snapshot and the bootstrap root config.
///
/// Constructed explicitly and handed to the reconciler; there is no global handle.
#[derive(Clone)]
pub struct StateRepository {
  kv: Arc<dyn KvStore>,
}

impl StateRepository {
  pub fn new(kv: Arc<dyn KvStore>) -> Self {
    Self { kv }
  }

  /// Open the backend named by `location` (see [`open_store`]).
  ///
  /// # Errors
  ///
  /// Returns an error if the location cannot be parsed.
  pub fn open(location: &str) -> Result<Self, StateError> {
    Ok(Self::new(open_store(location)?))
  }

  pub fn location(&self) -> String {
    self.kv.location()
  }

  /// The last committed snapshot, or `None` on first run.
  ///
  /// # Errors
  ///
  /// `Unavailable` if the backend cannot be reached, `Parse` if the blob is corrupt.
  pub fn load(&self) -> Result<Option<Snapshot>, StateError> {
    let Some(bytes) = self.kv.get(SNAPSHOT_KEY)? else {
      debug!(location = %self.location(), "no prior snapshot");
      return Ok(None);
    };

    let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| StateError::Parse {
      key: SNAPSHOT_KEY,
      source: e,
    })?;

    if snapshot.version != SNAPSHOT_VERSION {
      return Err(StateError::UnsupportedVersion(snapshot.version));
    }
    if let Some((service, _)) = snapshot.entries.iter().find(|(_, fp)| !fp.is_well_formed()) {
      return Err(StateError::MalformedFingerprint {
        key: SNAPSHOT_KEY,
        service: service.clone(),
      });
    }

    debug!(revision = %snapshot.revision, entries = snapshot.len(), "loaded snapshot");
    Ok(Some(snapshot))
  }

  /// Replace the stored snapshot with a single-key overwrite.
  ///
  /// # Errors
  ///
  /// `Unavailable` if the backend cannot be reached, `Io` on write failure.
  pub fn commit(&self, snapshot: &Snapshot) -> Result<(), StateError> {
    let bytes = serde_json::to_vec_pretty(snapshot).map_err(|e| StateError::Serialize {
      key: SNAPSHOT_KEY,
      source: e,
    })?;
    self.kv.set(SNAPSHOT_KEY, &bytes)?;
    info!(revision = %snapshot.revision, entries = snapshot.len(), "snapshot committed");
    Ok(())
  }

  /// The persisted bootstrap config, if one was stored.
  ///
  /// # Errors
  ///
  /// `Unavailable` if the backend cannot be reached, `Parse` if the blob is corrupt.
  pub fn load_root_config(&self) -> Result<Option<RootConfig>, StateError> {
    let Some(bytes) = self.kv.get(ROOT_CONFIG_KEY)? else {
      return Ok(None);
    };
    let config = serde_json::from_slice(&bytes).map_err(|e| StateError::Parse {
      key: ROOT_CONFIG_KEY,
      source: e,
    })?;
    Ok(Some(config))
  }

  /// Persist `config` as the bootstrap config for later runs.
  ///
  /// # Errors
  ///
  /// `Unavailable` if the backend cannot be reached, `Io` on write failure.
  pub fn store_root_config(&self, config: &RootConfig) -> Result<(), StateError> {
    let bytes = serde_json::to_vec_pretty(config).map_err(|e| StateError::Serialize {
      key: ROOT_CONFIG_KEY,
      source: e,
    })?;
    self.kv.set(ROOT_CONFIG_KEY, &bytes)?;
    info!(config = %config.config_file_path.display(), "bootstrap config stored");
    Ok(())
  }
}

impl std::fmt::Debug for StateRepository {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StateRepository")
      .field("location", &self.kv.location())
      .finish()
  }
}
