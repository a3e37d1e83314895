//! Bootstrap a reconciler host.
//!
//! `init` clones the configuration repository into a local directory, loads
//! its root config and persists it as the bootstrap config, so later `start`
//! invocations need no path.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ResolveError, RootConfig, resolve_root};
use crate::consts::ROOT_CONFIG_FILENAME;
use crate::error::ErrorKind;
use crate::state::{StateError, StateRepository};

/// Errors that can occur during initialization.
#[derive(Debug, Error)]
pub enum InitError {
  #[error("destination is not empty: {}", path.display())]
  PathExists { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to check out '{url}': {source}")]
  Checkout {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to resolve HEAD: {0}")]
  ResolveHead(String),

  #[error("invalid root config: {0}")]
  Config(#[from] ResolveError),

  #[error("failed to persist bootstrap config: {0}")]
  State(#[from] StateError),
}

impl InitError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      InitError::PathExists { .. } => ErrorKind::Parse,
      InitError::CreateDir { .. } => ErrorKind::Io,
      InitError::Clone { .. } | InitError::Checkout { .. } | InitError::ResolveHead(_) => ErrorKind::Unavailable,
      InitError::Config(e) => e.kind(),
      InitError::State(e) => e.kind(),
    }
  }
}

/// Options for `init`.
#[derive(Debug, Clone)]
pub struct InitOptions {
  /// Where to materialize the repository. Must be missing or empty.
  pub path: PathBuf,
  /// Repository URL, local path, or GitHub `owner/name` shorthand.
  pub repository: String,
  /// Root config file name inside the repository.
  pub config_name: String,
}

impl InitOptions {
  pub fn new(path: PathBuf, repository: impl Into<String>) -> Self {
    Self {
      path,
      repository: repository.into(),
      config_name: ROOT_CONFIG_FILENAME.to_string(),
    }
  }
}

/// Result of a successful initialization.
#[derive(Debug)]
pub struct InitResult {
  /// The checked-out repository (canonicalized).
  pub repo_dir: PathBuf,
  /// URL the repository was cloned from.
  pub url: String,
  /// Commit checked out.
  pub commit: String,
  /// The bootstrap config that was persisted.
  pub config: RootConfig,
}

/// Expand a repository argument into something `gix` can clone.
///
/// URLs (`scheme://`, `git@host:path`) and existing local paths are passed
/// through; a bare `owner/name` is taken to mean a GitHub repository over HTTPS.
pub fn repository_url(repository: &str) -> String {
  let looks_like_url = repository.contains("://") || repository.starts_with("git@");
  if looks_like_url || Path::new(repository).exists() {
    return repository.to_string();
  }

  let parts: Vec<&str> = repository.trim_end_matches(".git").split('/').collect();
  match parts.as_slice() {
    [owner, name] if !owner.is_empty() && !name.is_empty() => format!("https://github.com/{owner}/{name}"),
    _ => repository.to_string(),
  }
}

/// Clone, load the root config, and persist it.
///
/// # Errors
///
/// Returns an error if:
/// - the destination exists and is not empty
/// - the clone or checkout fails
/// - the repository has no valid root config
/// - the state backend cannot be written
pub fn init(options: &InitOptions, state: &StateRepository) -> Result<InitResult, InitError> {
  let dest = &options.path;
  ensure_empty_dir(dest)?;

  let url = repository_url(&options.repository);
  info!(url = %url, path = %dest.display(), "cloning repository");
  let repo = clone_repo(&url, dest)?;
  let commit = head_commit(&repo)?;
  debug!(commit = %commit, "checked out");

  let repo_dir = dunce::canonicalize(dest).map_err(|e| InitError::CreateDir {
    path: dest.clone(),
    source: e,
  })?;

  let config = resolve_root(&repo_dir.join(&options.config_name))?;
  state.store_root_config(&config)?;

  info!(
    path = %repo_dir.display(),
    watch = %config.watch_path.display(),
    state = %state.location(),
    "initialized"
  );

  Ok(InitResult {
    repo_dir,
    url,
    commit,
    config,
  })
}

fn ensure_empty_dir(dest: &Path) -> Result<(), InitError> {
  if dest.exists() {
    let mut entries = fs::read_dir(dest).map_err(|e| InitError::CreateDir {
      path: dest.to_path_buf(),
      source: e,
    })?;
    if entries.next().is_some() {
      return Err(InitError::PathExists {
        path: dest.to_path_buf(),
      });
    }
    return Ok(());
  }

  fs::create_dir_all(dest).map_err(|e| InitError::CreateDir {
    path: dest.to_path_buf(),
    source: e,
  })
}

fn clone_repo(url: &str, dest: &Path) -> Result<gix::Repository, InitError> {
  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| InitError::Clone {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| InitError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| InitError::Checkout {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(repo)
}

fn head_commit(repo: &gix::Repository) -> Result<String, InitError> {
  let mut head = repo.head().map_err(|e| InitError::ResolveHead(e.to_string()))?;
  let commit = head
    .peel_to_commit()
    .map_err(|e| InitError::ResolveHead(e.to_string()))?;
  Ok(commit.id.to_string())
}
