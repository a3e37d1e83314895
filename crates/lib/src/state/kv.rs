//! Key-value backends for state persistence.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::Commands;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;

/// How long to wait for a network backend before declaring it unavailable.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from a key-value backend.
#[derive(Debug, Error)]
pub enum KvError {
  /// The backend cannot be reached.
  #[error("state backend unavailable at {location}: {message}")]
  Unavailable { location: String, message: String },

  /// Reading a key failed.
  #[error("failed to read key '{key}': {source}")]
  Read {
    key: String,
    #[source]
    source: io::Error,
  },

  /// Writing a key failed.
  #[error("failed to write key '{key}': {source}")]
  Write {
    key: String,
    #[source]
    source: io::Error,
  },

  /// The location string does not name a usable backend.
  #[error("invalid state location '{location}': {message}")]
  InvalidLocation { location: String, message: String },
}

impl KvError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      KvError::Unavailable { .. } => ErrorKind::Unavailable,
      KvError::Read { .. } | KvError::Write { .. } => ErrorKind::Io,
      KvError::InvalidLocation { .. } => ErrorKind::Parse,
    }
  }
}

/// Opaque get/set byte-blob storage.
///
/// `set` must replace the value of one key atomically: a concurrent or later
/// `get` observes either the previous value or the new one.
pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

  fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError>;

  /// Human-readable location for logs.
  fn location(&self) -> String;
}

/// Open the backend named by `location`.
///
/// # Errors
///
/// `InvalidLocation` if a URL cannot be parsed.
pub fn open_store(location: &str) -> Result<Arc<dyn KvStore>, KvError> {
  if location.starts_with("redis://") || location.starts_with("rediss://") {
    return Ok(Arc::new(RedisKv::open(location)?));
  }
  if location == "memory:" {
    return Ok(Arc::new(MemoryKv::new()));
  }
  let dir = location.strip_prefix("file://").unwrap_or(location);
  if dir.is_empty() {
    return Err(KvError::InvalidLocation {
      location: location.to_string(),
      message: "empty path".to_string(),
    });
  }
  Ok(Arc::new(FileKv::new(PathBuf::from(dir))))
}

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryKv {
  values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KvStore for MemoryKv {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
    let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    Ok(values.get(key).cloned())
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
    let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
    values.insert(key.to_string(), value.to_vec());
    Ok(())
  }

  fn location(&self) -> String {
    "memory:".to_string()
  }
}

/// One file per key inside a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileKv {
  dir: PathBuf,
}

impl FileKv {
  pub fn new(dir: PathBuf) -> Self {
    Self { dir }
  }

  /// Path of the file backing `key`.
  pub fn key_path(&self, key: &str) -> PathBuf {
    let name: String = key
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
          c
        } else {
          '_'
        }
      })
      .collect();
    self.dir.join(name)
  }
}

impl KvStore for FileKv {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
    let path = self.key_path(key);
    match fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(KvError::Read {
        key: key.to_string(),
        source: e,
      }),
    }
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
    let write_err = |source: io::Error| KvError::Write {
      key: key.to_string(),
      source,
    };

    fs::create_dir_all(&self.dir).map_err(|e| KvError::Unavailable {
      location: self.location(),
      message: e.to_string(),
    })?;

    let path = self.key_path(key);
    let mut temp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
    temp.write_all(value).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(&path).map_err(|e| write_err(e.error))?;

    debug!(key, path = %path.display(), bytes = value.len(), "wrote state key");
    Ok(())
  }

  fn location(&self) -> String {
    self.dir.display().to_string()
  }
}

/// Redis (or protocol-compatible) server.
#[derive(Debug, Clone)]
pub struct RedisKv {
  client: redis::Client,
  location: String,
}

impl RedisKv {
  /// Create a client for `url`. No connection is made until first use.
  ///
  /// # Errors
  ///
  /// `InvalidLocation` if the URL cannot be parsed.
  pub fn open(url: &str) -> Result<Self, KvError> {
    let client = redis::Client::open(url).map_err(|e| KvError::InvalidLocation {
      location: url.to_string(),
      message: e.to_string(),
    })?;
    Ok(Self {
      client,
      location: url.to_string(),
    })
  }

  fn connection(&self) -> Result<redis::Connection, KvError> {
    self
      .client
      .get_connection_with_timeout(CONNECT_TIMEOUT)
      .map_err(|e| self.unavailable(e))
  }

  fn unavailable(&self, err: redis::RedisError) -> KvError {
    KvError::Unavailable {
      location: self.location.clone(),
      message: err.to_string(),
    }
  }
}

impl KvStore for RedisKv {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
    let mut con = self.connection()?;
    con.get::<_, Option<Vec<u8>>>(key).map_err(|e| self.unavailable(e))
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
    let mut con = self.connection()?;
    con.set::<_, _, ()>(key, value).map_err(|e| self.unavailable(e))
  }

  fn location(&self) -> String {
    self.location.clone()
  }
}
