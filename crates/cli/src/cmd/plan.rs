//! Implementation of the `pannugit plan` command.
//!
//! Resolves the tree and diffs it against the stored snapshot without
//! deploying or committing anything.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use pannugit_lib::diff::{Action, ChangeKind};
use pannugit_lib::execute::{ComposeConfig, ComposeExecutor};
use pannugit_lib::reconcile::{CyclePlan, ReconcileOptions, Reconciler};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_warning, symbols};

pub fn cmd_plan(state: &str, path: Option<&Path>, config: &str, output: OutputFormat) -> Result<()> {
  let state = super::open_state(state)?;
  let root = super::load_root(&state, path, config)?;

  // Planning never reaches the executor.
  let executor = Arc::new(ComposeExecutor::new(ComposeConfig::default(), root.store_path.clone()));
  let reconciler = Reconciler::new(
    state,
    executor,
    ReconcileOptions {
      dry_run: true,
      ..Default::default()
    },
  );

  let CyclePlan {
    previous,
    plan,
    warnings,
  } = reconciler.plan_cycle(&root).context("Failed to compute plan")?;

  if output.is_json() {
    let json = serde_json::json!({
      "revision": root.git_ref,
      "previous_revision": previous.as_ref().map(|s| s.revision.as_str()),
      "plan": plan,
      "warnings": warnings,
    });
    return print_json(&json);
  }

  for warning in &warnings {
    print_warning(&format!("{}: {}", warning.path.display(), warning.message));
  }
  for unknown in &plan.unknown_dependencies {
    print_warning(&unknown.to_string());
  }

  if plan.is_noop() {
    print_info(&format!("No changes at {}", root.git_ref));
    print_stat("Unchanged", &plan.count(Action::Skip).to_string());
    return Ok(());
  }

  println!("Plan at {}:", root.git_ref);
  for (wave, steps) in plan.waves().iter().enumerate() {
    println!("  Wave {}", wave + 1);
    for step in steps {
      let symbol = match step.change {
        ChangeKind::Created => symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()).to_string(),
        ChangeKind::Removed => symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()).to_string(),
        _ => symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()).to_string(),
      };
      println!("    {} {} ({})", symbol, step.service_key, step.change);
    }
  }
  println!();
  print_stat("Apply", &plan.count(Action::Apply).to_string());
  print_stat("Remove", &plan.count(Action::Remove).to_string());
  print_stat("Unchanged", &plan.count(Action::Skip).to_string());
  if !plan.excluded.is_empty() {
    print_stat("Excluded", &plan.excluded.len().to_string());
  }

  Ok(())
}
