//! Status command implementation.
//!
//! Displays the last committed snapshot.

use anyhow::{Context, Result};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, symbols};

pub fn cmd_status(state: &str, verbose: bool, output: OutputFormat) -> Result<()> {
  let state = super::open_state(state)?;

  let Some(snapshot) = state.load().context("Failed to load snapshot")? else {
    if output.is_json() {
      return print_json(&serde_json::Value::Null);
    }
    print_info("No snapshot found. Run 'pannugit start' to create one.");
    return Ok(());
  };

  if output.is_json() {
    return print_json(&snapshot);
  }

  print_success(&format!("Last applied revision: {}", snapshot.revision));
  print_stat("State", &state.location());
  print_stat("Services", &snapshot.len().to_string());

  if !snapshot.is_empty() {
    println!();
  }
  for (key, fingerprint) in &snapshot.entries {
    if verbose {
      println!("  {} {} {}", symbols::INFO, key, fingerprint);
    } else {
      println!("  {} {} {}", symbols::INFO, key, fingerprint.short());
    }
  }

  Ok(())
}
