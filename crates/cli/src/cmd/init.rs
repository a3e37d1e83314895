//! Implementation of the `pannugit init` command.
//!
//! Clones the configuration repository and stores its root config as the
//! bootstrap config used by `pannugit start` without a path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use pannugit_lib::init::{InitOptions, init};

use crate::output::symbols;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if `path` is not empty, the clone fails, or the repository
/// has no valid root config.
pub fn cmd_init(state: &str, path: PathBuf, repository: &str, config: &str) -> Result<()> {
  let state = super::open_state(state)?;

  let mut options = InitOptions::new(path, repository);
  options.config_name = config.to_string();

  let result = init(&options, &state).context("Failed to initialize")?;

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    "Initialized pannugit!".green().bold()
  );
  println!();
  println!("  {} Repository: {}", symbols::INFO.cyan(), result.url);
  println!("  {} Commit:     {}", symbols::INFO.cyan(), result.commit);
  println!("  {} Checkout:   {}", symbols::INFO.cyan(), result.repo_dir.display());
  println!(
    "  {} Watching:   {}",
    symbols::INFO.cyan(),
    result.config.watch_dir().display()
  );
  println!("  {} State:      {}", symbols::INFO.cyan(), state.location());
  println!();
  println!("{}", "Next steps:".bold());
  println!("  Run: {}", "pannugit start".cyan());

  Ok(())
}
