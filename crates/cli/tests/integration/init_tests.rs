//! Init command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn init_into_non_empty_directory_fails() {
  let env = TestEnv::new();

  env
    .cmd()
    .arg("init")
    .arg(env.repo_path())
    .arg("org/example")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to initialize"));
}

#[test]
fn init_from_missing_repository_fails() {
  let env = TestEnv::new();
  let missing = env.temp.path().join("no-such-repo");

  env
    .cmd()
    .arg("init")
    .arg(env.temp.path().join("checkout"))
    .arg(format!("file://{}", missing.display()))
    .assert()
    .failure();

  env
    .cmd()
    .args(["start", "--once", "--compose", "true"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No bootstrap config"));
}
