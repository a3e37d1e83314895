//! End-to-end cycles over a real tree with a recording executor.

use pannugit_lib::diff::Action;

use super::common::{TestEnv, entries, fp, pending};

#[tokio::test]
async fn two_service_scenario() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");

  let first = env.cycle().await.unwrap();
  assert_eq!(pending(&first), vec!["apply a/svc", "apply b/svc"]);
  assert_eq!(env.executor.take_calls(), vec!["apply a/svc", "apply b/svc"]);
  assert_eq!(
    entries(&env.state()),
    vec![
      ("a/svc".to_string(), fp("a/svc", "X")),
      ("b/svc".to_string(), fp("b/svc", "Y")),
    ]
  );

  env.write_service("b", "Y'");
  let second = env.cycle().await.unwrap();
  assert_eq!(pending(&second), vec!["apply b/svc"]);
  assert_eq!(env.executor.take_calls(), vec!["apply b/svc"]);
  assert_eq!(
    entries(&env.state()),
    vec![
      ("a/svc".to_string(), fp("a/svc", "X")),
      ("b/svc".to_string(), fp("b/svc", "Y'")),
    ]
  );
}

#[tokio::test]
async fn second_run_without_changes_is_idempotent() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");

  env.cycle().await.unwrap();
  let before = env.snapshot_bytes().unwrap();
  env.executor.take_calls();

  let second = env.cycle().await.unwrap();
  assert!(second.plan.is_noop());
  assert_eq!(second.plan.count(Action::Skip), 2);
  assert!(!second.committed);
  assert!(env.executor.take_calls().is_empty());
  assert_eq!(env.snapshot_bytes().unwrap(), before);
}

#[tokio::test]
async fn whitespace_change_is_a_change() {
  let env = TestEnv::new();
  env.write_service("a", "services:\n  web: {}\n");
  env.cycle().await.unwrap();

  env.write_service("a", "services:\n  web: {}\n\n");
  let report = env.cycle().await.unwrap();
  assert_eq!(pending(&report), vec!["apply a/svc"]);
}

#[tokio::test]
async fn deleted_manifest_is_removed() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.write_service("b", "Y");
  env.cycle().await.unwrap();
  env.executor.take_calls();

  env.remove_service("b");
  let report = env.cycle().await.unwrap();
  assert_eq!(pending(&report), vec!["remove b/svc"]);
  assert_eq!(env.executor.take_calls(), vec!["remove b/svc"]);
  assert_eq!(report.removed(), 1);
  assert_eq!(entries(&env.state()), vec![("a/svc".to_string(), fp("a/svc", "X"))]);
}

#[tokio::test]
async fn removal_runs_before_applies() {
  let env = TestEnv::new();
  env.write_service("z", "Z");
  env.cycle().await.unwrap();
  env.executor.take_calls();

  env.remove_service("z");
  env.write_service("a", "A");
  env.cycle().await.unwrap();
  assert_eq!(env.executor.take_calls(), vec!["remove z/svc", "apply a/svc"]);
}

#[tokio::test]
async fn new_ref_without_changes_updates_revision_only() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.cycle().await.unwrap();
  env.executor.take_calls();

  let report = env.reconciler.run_cycle(&env.root_at("v2"), &super::common::no_shutdown()).await.unwrap();
  assert!(report.plan.is_noop());
  assert!(report.committed);
  assert!(env.executor.take_calls().is_empty());

  let snapshot = env.state().load().unwrap().unwrap();
  assert_eq!(snapshot.revision, "v2");
  assert_eq!(snapshot.entries.len(), 1);
}

#[tokio::test]
async fn ref_bump_is_read_on_next_cycle() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  let config_file = env.write_root_config("ref: v1\nwatchPath: services\n");

  let shutdown = super::common::no_shutdown();
  let first = env.reconciler.run_cycle_from(&config_file, &shutdown).await.unwrap();
  assert_eq!(first.revision, "v1");

  env.write_root_config("ref: v2\nwatchPath: services\n");
  env.write_service("a", "X2");
  let second = env.reconciler.run_cycle_from(&config_file, &shutdown).await.unwrap();
  assert_eq!(second.revision, "v2");
  assert_eq!(pending(&second), vec!["apply a/svc"]);

  let snapshot = env.state().load().unwrap().unwrap();
  assert_eq!(snapshot.revision, "v2");
  assert_eq!(entries(&env.state()), vec![("a/svc".to_string(), fp("a/svc", "X2"))]);
}

#[tokio::test]
async fn unreadable_root_config_fails_the_cycle_only() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  let config_file = env.write_root_config("ref: v1\nwatchPath: services\n");
  let shutdown = super::common::no_shutdown();
  env.reconciler.run_cycle_from(&config_file, &shutdown).await.unwrap();
  let before = env.snapshot_bytes().unwrap();

  env.write_root_config("ref: [unclosed\n");
  let err = env.reconciler.run_cycle_from(&config_file, &shutdown).await.unwrap_err();
  assert!(matches!(err, pannugit_lib::reconcile::ReconcileError::Resolve(_)));
  assert_eq!(err.kind(), pannugit_lib::ErrorKind::Parse);
  assert_eq!(env.snapshot_bytes().unwrap(), before);

  env.write_root_config("ref: v2\nwatchPath: services\n");
  let report = env.reconciler.run_cycle_from(&config_file, &shutdown).await.unwrap();
  assert_eq!(report.revision, "v2");
}

#[tokio::test]
async fn restart_does_not_redeploy() {
  let env = TestEnv::new();
  env.write_service("a", "X");
  env.cycle().await.unwrap();

  // A fresh reconciler over the same persisted state, as after a process restart.
  let restarted = pannugit_lib::reconcile::Reconciler::new(
    env.state(),
    env.executor.clone(),
    pannugit_lib::reconcile::ReconcileOptions::default(),
  );
  env.executor.take_calls();
  let report = restarted
    .run_cycle(&env.root(), &super::common::no_shutdown())
    .await
    .unwrap();
  assert!(report.plan.is_noop());
  assert!(env.executor.take_calls().is_empty());
}

#[tokio::test]
async fn empty_tree_on_first_run() {
  let env = TestEnv::new();
  let report = env.cycle().await.unwrap();
  assert!(report.plan.steps.is_empty());
  assert!(entries(&env.state()).is_empty());
}
