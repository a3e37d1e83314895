//! Shared helpers for reconciliation integration tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pannugit_lib::config::{ResolvedArtifact, RootConfig, ServiceKey};
use pannugit_lib::execute::{DeploymentExecutor, Outcome};
use pannugit_lib::reconcile::{CycleReport, ReconcileError, ReconcileOptions, Reconciler};
use pannugit_lib::state::{FileKv, StateRepository};
use tempfile::TempDir;

/// A deployment executor that records calls instead of running anything.
#[derive(Default)]
pub struct RecordingExecutor {
  calls: Mutex<Vec<String>>,
  failing: Mutex<BTreeSet<String>>,
  shutdown_on_call: Mutex<Option<Arc<AtomicBool>>>,
}

impl RecordingExecutor {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Make every call for `key` fail from now on.
  pub fn fail(&self, key: &str) {
    self.failing.lock().unwrap().insert(key.to_string());
  }

  pub fn recover(&self, key: &str) {
    self.failing.lock().unwrap().remove(key);
  }

  /// Request shutdown as soon as the next call is made.
  pub fn shutdown_on_call(&self, flag: Arc<AtomicBool>) {
    *self.shutdown_on_call.lock().unwrap() = Some(flag);
  }

  /// Calls so far, as `apply <key>` / `remove <key>`, and clear the log.
  pub fn take_calls(&self) -> Vec<String> {
    std::mem::take(&mut *self.calls.lock().unwrap())
  }

  fn record(&self, call: String, key: &ServiceKey) -> Outcome {
    self.calls.lock().unwrap().push(call);
    if let Some(flag) = self.shutdown_on_call.lock().unwrap().as_ref() {
      flag.store(true, Ordering::SeqCst);
    }
    if self.failing.lock().unwrap().contains(key.as_str()) {
      Outcome::failure("compose exited with code 1")
    } else {
      Outcome::Success
    }
  }
}

#[async_trait]
impl DeploymentExecutor for RecordingExecutor {
  async fn apply(&self, artifact: &ResolvedArtifact) -> Outcome {
    self.record(format!("apply {}", artifact.service_key), &artifact.service_key)
  }

  async fn remove(&self, key: &ServiceKey) -> Outcome {
    self.record(format!("remove {key}"), key)
  }
}

/// Isolated source tree plus file-backed state.
///
/// Layout: `<temp>/repo/services/...` is the tree, `<temp>/state` the store.
pub struct TestEnv {
  pub temp: TempDir,
  pub executor: Arc<RecordingExecutor>,
  pub reconciler: Reconciler,
}

impl TestEnv {
  pub fn new() -> Self {
    Self::with_options(ReconcileOptions::default())
  }

  pub fn with_options(options: ReconcileOptions) -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("repo").join("services")).unwrap();
    let executor = RecordingExecutor::new();
    let reconciler = Reconciler::new(Self::state_in(temp.path()), executor.clone(), options);
    Self {
      temp,
      executor,
      reconciler,
    }
  }

  fn state_in(dir: &Path) -> StateRepository {
    StateRepository::new(Arc::new(FileKv::new(dir.join("state"))))
  }

  /// A second handle on the same persisted state.
  pub fn state(&self) -> StateRepository {
    Self::state_in(self.temp.path())
  }

  pub fn services_dir(&self) -> PathBuf {
    self.temp.path().join("repo").join("services")
  }

  /// Raw bytes of the stored snapshot blob.
  pub fn snapshot_bytes(&self) -> Option<Vec<u8>> {
    let kv = FileKv::new(self.temp.path().join("state"));
    std::fs::read(kv.key_path(pannugit_lib::consts::SNAPSHOT_KEY)).ok()
  }

  pub fn root(&self) -> RootConfig {
    self.root_at("main")
  }

  pub fn root_at(&self, git_ref: &str) -> RootConfig {
    RootConfig {
      config_file_path: self.temp.path().join("repo").join("pannugit.yaml"),
      git_ref: git_ref.to_string(),
      watch_path: PathBuf::from("services"),
      store_path: self.temp.path().join("repo"),
    }
  }

  /// Write the root config document at `repo/pannugit.yaml` and return its path.
  pub fn write_root_config(&self, content: &str) -> PathBuf {
    let path = self.temp.path().join("repo").join("pannugit.yaml");
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Write `<dir>/svc.pannugit.yaml` pointing at `<dir>/compose.yaml` with `content`.
  /// The service key is `<dir>/svc`.
  pub fn write_service(&self, dir: &str, content: &str) {
    self.write_service_with_deps(dir, content, &[]);
  }

  pub fn write_service_with_deps(&self, dir: &str, content: &str, deps: &[&str]) {
    let mut manifest = String::from("override: compose.yaml\n");
    if !deps.is_empty() {
      manifest.push_str("dependsOn:\n");
      for dep in deps {
        manifest.push_str(&format!("  - {dep}\n"));
      }
    }
    self.write_file(&format!("{dir}/svc.pannugit.yaml"), &manifest);
    self.write_file(&format!("{dir}/compose.yaml"), content);
  }

  /// Write a file relative to the services directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.services_dir().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn remove_file(&self, relative_path: &str) {
    std::fs::remove_file(self.services_dir().join(relative_path)).unwrap();
  }

  pub fn remove_service(&self, dir: &str) {
    std::fs::remove_dir_all(self.services_dir().join(dir)).unwrap();
  }

  pub async fn cycle(&self) -> Result<CycleReport, ReconcileError> {
    self.cycle_with(&no_shutdown()).await
  }

  pub async fn cycle_with(&self, shutdown: &Arc<AtomicBool>) -> Result<CycleReport, ReconcileError> {
    self.reconciler.run_cycle(&self.root(), shutdown).await
  }
}

pub fn no_shutdown() -> Arc<AtomicBool> {
  Arc::new(AtomicBool::new(false))
}

/// Pending steps of a report as `action key`, in plan order.
pub fn pending(report: &CycleReport) -> Vec<String> {
  report
    .plan
    .pending()
    .map(|s| format!("{} {}", s.action, s.service_key))
    .collect()
}

/// The stored snapshot's entries as `(key, fingerprint)` pairs.
pub fn entries(state: &StateRepository) -> Vec<(String, String)> {
  state
    .load()
    .unwrap()
    .map(|s| s.entries.into_iter().map(|(k, v)| (k.0, v.0)).collect())
    .unwrap_or_default()
}

pub fn fp(key: &str, content: &str) -> String {
  pannugit_lib::util::hash::Fingerprint::compute(key, content.as_bytes()).0
}
