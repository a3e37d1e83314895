//! Implementation of the `pannugit start` command.
//!
//! Runs reconciliation cycles on an interval until Ctrl-C, or once with `--once`.
//! The root config is re-read at the start of every cycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tokio::sync::Notify;
use tracing::{error, info};

use pannugit_lib::config::resolve_root;
use pannugit_lib::cycle_lock::CycleLock;
use pannugit_lib::execute::{ComposeConfig, ComposeExecutor};
use pannugit_lib::reconcile::{CycleReport, ReconcileError, ReconcileOptions, Reconciler};

use crate::output::{format_duration, print_error, print_info, print_stat, print_success, print_warning};

pub struct StartArgs {
  pub state: String,
  pub path: Option<PathBuf>,
  pub config: String,
  pub once: bool,
  pub interval: Duration,
  pub parallelism: usize,
  pub compose: String,
  pub pull: bool,
}

pub fn cmd_start(args: StartArgs) -> Result<()> {
  if args.parallelism == 0 {
    bail!("--parallelism must be at least 1");
  }
  if !args.once && args.interval.is_zero() {
    bail!("--interval must be greater than zero");
  }
  let compose = ComposeConfig::from_command(&args.compose, args.pull).context("--compose must not be empty")?;

  let _lock = CycleLock::acquire("pannugit start").context("Failed to acquire reconcile lock")?;

  let state = super::open_state(&args.state)?;
  let config_file = super::root_config_file(&state, args.path.as_deref(), &args.config)?;
  let root = resolve_root(&config_file)
    .with_context(|| format!("Failed to load root config: {}", config_file.display()))?;
  if args.path.is_some() {
    state
      .store_root_config(&root)
      .context("Failed to store bootstrap config")?;
  }

  info!(
    state = %state.location(),
    config = %config_file.display(),
    compose = %compose.display(),
    parallelism = args.parallelism,
    "starting reconciler"
  );

  let executor = Arc::new(ComposeExecutor::new(compose, root.store_path.clone()));
  let reconciler = Reconciler::new(
    state,
    executor,
    ReconcileOptions {
      parallelism: args.parallelism,
      dry_run: false,
    },
  );

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(run(&reconciler, &config_file, args.once, args.interval))
}

async fn run(reconciler: &Reconciler, config_file: &Path, once: bool, interval: Duration) -> Result<()> {
  let shutdown = Arc::new(AtomicBool::new(false));
  let wake = Arc::new(Notify::new());
  {
    let shutdown = shutdown.clone();
    let wake = wake.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested; letting in-flight deployments finish");
        shutdown.store(true, Ordering::SeqCst);
        wake.notify_one();
      }
    });
  }

  loop {
    let started = Instant::now();
    match reconciler.run_cycle_from(config_file, &shutdown).await {
      Ok(report) => {
        print_report(&report, started.elapsed());
        if once {
          if !report.is_success() {
            bail!(
              "{} deployment(s) failed, {} skipped",
              report.execution.failed(),
              report.execution.skipped()
            );
          }
          return Ok(());
        }
      }
      Err(ReconcileError::Interrupted) => {
        print_info("Interrupted before any deployment was issued");
        return Ok(());
      }
      Err(err) if once => return Err(err).context("Reconciliation cycle failed"),
      Err(err) => {
        error!(kind = %err.kind(), error = %err, "cycle failed; retrying after interval");
      }
    }

    if shutdown.load(Ordering::SeqCst) {
      print_info("Shut down");
      return Ok(());
    }

    tokio::select! {
      _ = tokio::time::sleep(interval) => {}
      _ = wake.notified() => {
        print_info("Shut down");
        return Ok(());
      }
    }
  }
}

fn print_report(report: &CycleReport, elapsed: Duration) {
  for warning in &report.warnings {
    print_warning(&format!("{}: {}", warning.path.display(), warning.message));
  }

  let failed = report.execution.failed();
  if failed == 0 {
    print_success(&format!(
      "Cycle complete at {} in {}",
      report.revision,
      format_duration(elapsed)
    ));
  } else {
    print_error(&format!("Cycle at {} finished with {} failure(s)", report.revision, failed));
    for (key, outcome) in report.execution.outcomes.iter().filter(|(_, o)| !o.is_success()) {
      print_stat(key.as_str(), &outcome.to_string());
    }
  }
  print_stat("Applied", &report.applied().to_string());
  print_stat("Removed", &report.removed().to_string());
  print_stat("Unchanged", &report.unchanged().to_string());
  if report.execution.interrupted {
    print_warning("Interrupted: remaining deployments were not issued");
  }
}
