//! Compose-based deployment.
//!
//! Each service is deployed as its own compose project. The project name is
//! derived from the service key alone, so a removed service can be brought
//! down after its compose file is gone from the tree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::{ResolvedArtifact, ServiceKey};
use crate::util::hash::hash_bytes;

use super::DeploymentExecutor;
use super::types::{ComposeConfig, ExecuteError, Outcome};

/// Number of hash characters appended to a project name.
const PROJECT_HASH_LEN: usize = 8;

/// Runs `<compose> up -d` / `<compose> down` per service.
#[derive(Debug, Clone)]
pub struct ComposeExecutor {
  config: ComposeConfig,
  store_root: PathBuf,
}

impl ComposeExecutor {
  /// `store_root` is the working directory for `down`, which has no artifact directory.
  pub fn new(config: ComposeConfig, store_root: PathBuf) -> Self {
    Self { config, store_root }
  }

  pub fn config(&self) -> &ComposeConfig {
    &self.config
  }

  /// Compose project name for a service.
  ///
  /// Lowercase alphanumerics, `-` and `_`, starting with an alphanumeric,
  /// plus a short hash of the full key so that keys differing only in
  /// replaced characters (`a/b` vs `a-b`) stay distinct.
  pub fn project_name(key: &ServiceKey) -> String {
    let sanitized: String = key
      .as_str()
      .chars()
      .map(|c| match c {
        c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
        '-' | '_' => c,
        _ => '-',
      })
      .collect();
    let sanitized = sanitized.trim_matches(|c| c == '-' || c == '_');
    let base = if sanitized.is_empty() { "root" } else { sanitized };

    let hash = hash_bytes(key.as_str().as_bytes());
    format!("{base}-{}", &hash[..PROJECT_HASH_LEN])
  }

  async fn run(&self, args: Vec<OsString>, cwd: &Path) -> Result<(), ExecuteError> {
    let cmd = format!(
      "{} {}",
      self.config.display(),
      args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
    );
    debug!(cmd = %cmd, cwd = %cwd.display(), "spawning compose");

    let output = Command::new(&self.config.program)
      .args(&self.config.args)
      .args(&args)
      .current_dir(cwd)
      .output()
      .await
      .map_err(|e| ExecuteError::Spawn {
        program: self.config.program.clone(),
        source: e,
      })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
      debug!(stdout = %stdout.trim(), "compose stdout");
    }
    if !stderr.trim().is_empty() {
      debug!(stderr = %stderr.trim(), "compose stderr");
    }

    if !output.status.success() {
      return Err(ExecuteError::CmdFailed {
        cmd,
        code: output.status.code(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl DeploymentExecutor for ComposeExecutor {
  async fn apply(&self, artifact: &ResolvedArtifact) -> Outcome {
    let project = Self::project_name(&artifact.service_key);
    let base: Vec<OsString> = vec![
      "-f".into(),
      artifact.artifact_path.clone().into_os_string(),
      "-p".into(),
      project.clone().into(),
    ];

    if self.config.pull {
      let mut args = base.clone();
      args.push("pull".into());
      if let Err(e) = self.run(args, artifact.working_dir()).await {
        error!(service = %artifact.service_key, error = %e, "pull failed");
        return Outcome::failure(e);
      }
    }

    let mut args = base;
    args.extend(["up".into(), "-d".into()]);
    match self.run(args, artifact.working_dir()).await {
      Ok(()) => {
        info!(service = %artifact.service_key, project = %project, "service deployed");
        Outcome::Success
      }
      Err(e) => {
        error!(service = %artifact.service_key, error = %e, "deploy failed");
        Outcome::failure(e)
      }
    }
  }

  async fn remove(&self, key: &ServiceKey) -> Outcome {
    let project = Self::project_name(key);
    let args: Vec<OsString> = vec!["-p".into(), project.clone().into(), "down".into()];
    match self.run(args, &self.store_root).await {
      Ok(()) => {
        info!(service = %key, project = %project, "service removed");
        Outcome::Success
      }
      Err(e) => {
        error!(service = %key, error = %e, "remove failed");
        Outcome::failure(e)
      }
    }
  }
}
