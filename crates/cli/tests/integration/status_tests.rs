//! Status command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn status_without_snapshot() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("No snapshot found"));
}

#[test]
fn status_json_without_snapshot_is_null() {
  let env = TestEnv::new();

  env
    .cmd()
    .args(["status", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::diff("null\n"));
}

#[cfg(unix)]
#[test]
fn status_lists_applied_services() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");
  env.start_once("true").assert().success();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("Last applied revision: main"))
    .stdout(predicate::str::contains("Services: 2"))
    .stdout(predicate::str::contains("a/svc"))
    .stdout(predicate::str::contains("b/svc"));
}

#[cfg(unix)]
#[test]
fn status_json_matches_snapshot() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.start_once("true").assert().success();

  let output = env.cmd().args(["status", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["version"], 1);
  assert_eq!(json["revision"], "main");
  let entries = json["entries"].as_object().unwrap();
  assert_eq!(entries.len(), 1);
  assert!(entries.contains_key("a/svc"));
}

#[cfg(unix)]
#[test]
fn failed_service_is_not_recorded() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.start_once("false").assert().failure();

  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("No snapshot found"));
}

#[test]
fn corrupt_fingerprint_is_reported() {
  let env = TestEnv::new();
  env.write_file(
    "state/pannugit_snapshot",
    r#"{"version": 1, "revision": "main", "entries": {"a/svc": "aéééééééééééé"}}"#,
  );

  env
    .cmd()
    .arg("status")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("malformed fingerprint"));
}
