//! Start command integration tests.
//!
//! `true` and `false` stand in for the compose tool.

#![cfg(unix)]

use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use predicates::prelude::*;

use super::common::TestEnv;

/// Kills the background `pannugit start` when dropped.
struct Running(Child);

impl Drop for Running {
  fn drop(&mut self) {
    let _ = self.0.kill();
    let _ = self.0.wait();
  }
}

/// `pannugit start <repo> --interval 100ms --compose true` in the background.
fn start_looping(env: &TestEnv) -> Running {
  let child = std::process::Command::new(env!("CARGO_BIN_EXE_pannugit"))
    .arg("start")
    .arg(env.repo_path())
    .args(["--interval", "100ms", "--compose", "true"])
    .env("PANNUGIT_STATE", env.state_path())
    .env("PANNUGIT_DATA_DIR", env.data_path())
    .env_remove("RUST_LOG")
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .unwrap();
  Running(child)
}

/// Poll `status -o json` until the committed revision is `expected`.
fn wait_for_revision(env: &TestEnv, expected: &str) -> bool {
  let deadline = Instant::now() + Duration::from_secs(20);
  while Instant::now() < deadline {
    let output = env.cmd().args(["status", "-o", "json"]).output().unwrap();
    let revision = serde_json::from_slice::<serde_json::Value>(&output.stdout)
      .ok()
      .and_then(|json| json["revision"].as_str().map(str::to_string));
    if revision.as_deref() == Some(expected) {
      return true;
    }
    std::thread::sleep(Duration::from_millis(100));
  }
  false
}

#[test]
fn start_once_deploys_new_services() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");

  env
    .start_once("true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Cycle complete at main"))
    .stdout(predicate::str::contains("Applied: 2"));
}

#[test]
fn second_run_is_a_no_op() {
  let env = TestEnv::new();
  env.write_service("a", "X");

  env.start_once("true").assert().success();
  env
    .start_once("true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Applied: 0"))
    .stdout(predicate::str::contains("Unchanged: 1"));
}

#[test]
fn removed_service_is_brought_down() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");
  env.start_once("true").assert().success();

  env.remove_service("b");
  env
    .start_once("true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed: 1"));
}

#[test]
fn failed_deployment_exits_non_zero() {
  let env = TestEnv::new();
  env.write_service("a", "X");

  env
    .start_once("false")
    .assert()
    .failure()
    .stdout(predicate::str::contains("a/svc"))
    .stderr(predicate::str::contains("1 deployment(s) failed"));

  // Nothing was recorded, so the next run tries again.
  env
    .start_once("true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Applied: 1"));
}

#[test]
fn missing_compose_tool_is_reported() {
  let env = TestEnv::new();
  env.write_service("a", "X");

  env
    .start_once("pannugit-no-such-compose")
    .assert()
    .failure()
    .stdout(predicate::str::contains("pannugit-no-such-compose"));
}

#[test]
fn start_with_path_stores_bootstrap_config() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.start_once("true").assert().success();

  env.write_service("a", "X2");
  env
    .cmd()
    .args(["start", "--once", "--compose", "true"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Applied: 1"));
}

#[test]
fn start_without_bootstrap_config_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["start", "--once", "--compose", "true"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No bootstrap config"));
}

#[test]
fn broken_manifest_is_reported_not_fatal() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_file("repo/services/b/svc.pannugit.yaml", "override: [unterminated\n");

  env
    .start_once("true")
    .assert()
    .success()
    .stdout(predicate::str::contains("Applied: 1"))
    .stderr(predicate::str::contains("svc.pannugit.yaml"));
}

#[test]
fn zero_parallelism_is_rejected() {
  let env = TestEnv::new();

  env
    .start_once("true")
    .args(["--parallelism", "0"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--parallelism"));
}

#[test]
fn missing_root_config_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("start")
    .arg(env.temp.path().join("nowhere"))
    .args(["--once", "--compose", "true"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load root config"));
}

#[test]
fn invalid_interval_is_rejected() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("start")
    .arg(env.repo_path())
    .args(["--interval", "soon"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--interval"));
}

#[test]
fn ref_bump_is_picked_up_without_restart() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  let _running = start_looping(&env);
  assert!(wait_for_revision(&env, "main"));

  env.write_file("repo/pannugit.yaml", "ref: release-2\nwatchPath: services\n");
  assert!(wait_for_revision(&env, "release-2"));
}
