mod init;
mod plan;
mod start;
mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use pannugit_lib::config::{RootConfig, resolve_root};
use pannugit_lib::state::StateRepository;

pub use init::cmd_init;
pub use plan::cmd_plan;
pub use start::{StartArgs, cmd_start};
pub use status::cmd_status;

fn open_state(location: &str) -> Result<StateRepository> {
  StateRepository::open(location).with_context(|| format!("Failed to open state backend: {}", location))
}

/// Locate the root config document: `path` (a file, or a directory holding
/// `config_name`), or the file the stored bootstrap config was loaded from.
fn root_config_file(state: &StateRepository, path: Option<&Path>, config_name: &str) -> Result<PathBuf> {
  if let Some(path) = path {
    let file = if path.is_dir() {
      path.join(config_name)
    } else {
      path.to_path_buf()
    };
    // Absolute, so the stored bootstrap config stays valid from any directory.
    return Ok(dunce::canonicalize(&file).unwrap_or(file));
  }

  match state.load_root_config().context("Failed to load bootstrap config")? {
    Some(config) => Ok(config.config_file_path),
    None => bail!(
      "No bootstrap config in {}. Run 'pannugit init' or pass a root config path.",
      state.location()
    ),
  }
}

/// Resolve the root config from `path`, or from the stored bootstrap config's file.
fn load_root(state: &StateRepository, path: Option<&Path>, config_name: &str) -> Result<RootConfig> {
  let file = root_config_file(state, path, config_name)?;
  resolve_root(&file).with_context(|| format!("Failed to load root config: {}", file.display()))
}
