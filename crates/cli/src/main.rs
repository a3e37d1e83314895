use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pannugit_lib::platform::paths::{STATE_ENV, state_location};

mod cmd;
mod output;

use output::{OutputFormat, print_error};

/// pannugit - GitOps reconciler for compose services
#[derive(Parser)]
#[command(name = "pannugit")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// State backend: a directory, file:///dir, redis://host:port/ or memory:
  #[arg(long, global = true, env = STATE_ENV, default_value_t = state_location())]
  state: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Reconcile deployed services against the source tree
  Start {
    /// Root config file, or a directory containing it (default: stored bootstrap config)
    path: Option<PathBuf>,

    /// Root config file name when PATH is a directory
    #[arg(long, default_value = pannugit_lib::consts::ROOT_CONFIG_FILENAME)]
    config: String,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Time between cycles (e.g. 30s, 5m)
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Maximum concurrent deployments within one wave
    #[arg(long, default_value_t = 1)]
    parallelism: usize,

    /// Compose command line
    #[arg(long, default_value = "docker compose")]
    compose: String,

    /// Pull images before bringing services up
    #[arg(long)]
    pull: bool,
  },

  /// Clone a repository and store its root config as the bootstrap config
  Init {
    /// Where to clone to (must be missing or empty)
    path: PathBuf,

    /// Repository URL, local path or GitHub owner/name
    repository: String,

    /// Root config file name inside the repository
    #[arg(long, default_value = pannugit_lib::consts::ROOT_CONFIG_FILENAME)]
    config: String,
  },

  /// Show what the next cycle would do without deploying anything
  Plan {
    /// Root config file, or a directory containing it (default: stored bootstrap config)
    path: Option<PathBuf>,

    /// Root config file name when PATH is a directory
    #[arg(long, default_value = pannugit_lib::consts::ROOT_CONFIG_FILENAME)]
    config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the last committed snapshot
  Status {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(err) = run(cli) {
    print_error(&format!("{err:#}"));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Commands::Start {
      path,
      config,
      once,
      interval,
      parallelism,
      compose,
      pull,
    } => cmd::cmd_start(cmd::StartArgs {
      state: cli.state,
      path,
      config,
      once,
      interval,
      parallelism,
      compose,
      pull,
    }),
    Commands::Init {
      path,
      repository,
      config,
    } => cmd::cmd_init(&cli.state, path, &repository, &config),
    Commands::Plan { path, config, output } => cmd::cmd_plan(&cli.state, path.as_deref(), &config, output),
    Commands::Status { output } => cmd::cmd_status(&cli.state, cli.verbose, output),
  }
}
