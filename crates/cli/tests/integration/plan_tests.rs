//! Plan command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn plan_lists_new_services() {
  let env = TestEnv::new();
  env.write_service("a", "X");

  env
    .cmd()
    .arg("plan")
    .arg(env.repo_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("+ a/svc (created)"))
    .stdout(predicate::str::contains("Apply: 1"));
}

#[test]
fn plan_does_not_commit() {
  let env = TestEnv::new();
  env.write_service("a", "X");

  env.cmd().arg("plan").arg(env.repo_path()).assert().success();
  env
    .cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("No snapshot found"));
}

#[test]
fn plan_json_output() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");

  let output = env
    .cmd()
    .arg("plan")
    .arg(env.repo_path())
    .args(["-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["revision"], "main");
  assert!(json["previous_revision"].is_null());
  let steps = json["plan"]["steps"].as_array().unwrap();
  assert_eq!(steps.len(), 2);
  assert_eq!(steps[0]["service_key"], "a/svc");
  assert_eq!(steps[0]["action"], "apply");
  assert_eq!(steps[0]["change"], "created");
}

#[test]
fn plan_without_changes() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("plan")
    .arg(env.repo_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("No changes at main"));
}

#[cfg(unix)]
#[test]
fn plan_after_start_shows_only_changes() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");
  env.start_once("true").assert().success();

  env.write_service("b", "Y2");
  env.remove_service("a");
  env
    .cmd()
    .arg("plan")
    .assert()
    .success()
    .stdout(predicate::str::contains("- a/svc (removed)"))
    .stdout(predicate::str::contains("~ b/svc (updated)"));
}
