//! Manifest discovery over a materialized source tree.
//!
//! [`ManifestWalker`] is a lazy iterator over every file under
//! `store_path/watch_path` whose name ends with [`MANIFEST_SUFFIX`]. Entries
//! are produced in file-name order so repeated walks of an unchanged tree
//! yield the same sequence. A directory that cannot be read does not end the
//! walk: it is yielded as an `Err` item and traversal continues with its
//! siblings, leaving the fatal-or-not decision to the caller.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::MANIFEST_SUFFIX;
use crate::error::ErrorKind;

/// Errors produced while discovering manifests.
#[derive(Debug, Error)]
pub enum SourceError {
  /// The directory to walk does not exist.
  #[error("watch directory not found: {}", path.display())]
  NotFound { path: PathBuf },

  /// The walk root exists but is not a directory.
  #[error("watch path is not a directory: {}", path.display())]
  NotADirectory { path: PathBuf },

  /// An entry below the root could not be read.
  #[error("failed to read {}: {message}", path.display())]
  Unreadable { path: PathBuf, message: String },
}

impl SourceError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      SourceError::NotFound { .. } => ErrorKind::NotFound,
      SourceError::NotADirectory { .. } | SourceError::Unreadable { .. } => ErrorKind::Io,
    }
  }
}

/// Returns true if `path` names a service manifest.
pub fn is_manifest(path: &Path) -> bool {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .is_some_and(|n| n.ends_with(MANIFEST_SUFFIX))
}

/// Lazy, restartable sequence of manifest paths below one directory.
#[derive(Debug, Clone)]
pub struct ManifestSource {
  root: PathBuf,
}

impl ManifestSource {
  /// Open the tree at `store_path/watch_path`.
  ///
  /// # Errors
  ///
  /// Returns [`SourceError::NotFound`] if the directory does not exist.
  pub fn open(store_path: &Path, watch_path: &Path) -> Result<Self, SourceError> {
    let root = store_path.join(watch_path);
    match root.metadata() {
      Ok(meta) if meta.is_dir() => Ok(Self { root }),
      Ok(_) => Err(SourceError::NotADirectory { path: root }),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::NotFound { path: root }),
      Err(e) => Err(SourceError::Unreadable {
        path: root,
        message: e.to_string(),
      }),
    }
  }

  /// The directory being walked.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Start a new walk. Every call begins from the root again.
  pub fn walk(&self) -> ManifestWalker {
    debug!(root = %self.root.display(), "walking manifest tree");
    ManifestWalker {
      inner: WalkDir::new(&self.root).follow_links(false).sort_by_file_name().into_iter(),
    }
  }
}

/// Iterator returned by [`ManifestSource::walk`].
pub struct ManifestWalker {
  inner: walkdir::IntoIter,
}

impl Iterator for ManifestWalker {
  type Item = Result<PathBuf, SourceError>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let entry = match self.inner.next()? {
        Ok(entry) => entry,
        Err(e) => {
          let path = e.path().map(Path::to_path_buf).unwrap_or_default();
          warn!(path = %path.display(), error = %e, "skipping unreadable entry");
          return Some(Err(SourceError::Unreadable {
            path,
            message: e.to_string(),
          }));
        }
      };

      if entry.file_type().is_file() && is_manifest(entry.path()) {
        return Some(Ok(entry.into_path()));
      }
    }
  }
}
