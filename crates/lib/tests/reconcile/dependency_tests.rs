//! `dependsOn` ordering across a real tree.

use pannugit_lib::ErrorKind;
use pannugit_lib::config::ServiceKey;
use pannugit_lib::execute::{Outcome, SkipReason};
use pannugit_lib::reconcile::ReconcileError;

use super::common::{TestEnv, entries};

#[tokio::test]
async fn dependencies_deploy_first() {
  let env = TestEnv::new();
  env.write_service_with_deps("app", "1", &["api/svc"]);
  env.write_service_with_deps("api", "2", &["db/svc"]);
  env.write_service("db", "3");
  env.write_service("cache", "4");

  env.cycle().await.unwrap();
  assert_eq!(
    env.executor.take_calls(),
    vec!["apply cache/svc", "apply db/svc", "apply api/svc", "apply app/svc"]
  );
}

#[tokio::test]
async fn failed_dependency_skips_dependents() {
  let env = TestEnv::new();
  env.write_service_with_deps("api", "1", &["db/svc"]);
  env.write_service("db", "2");
  env.write_service("web", "3");
  env.executor.fail("db/svc");

  let report = env.cycle().await.unwrap();
  assert_eq!(env.executor.take_calls(), vec!["apply db/svc", "apply web/svc"]);
  assert_eq!(
    report.execution.outcomes[&ServiceKey::from("api/svc")],
    Outcome::Skipped {
      reason: SkipReason::FailedDependency("db/svc".into())
    }
  );
  let keys: Vec<String> = entries(&env.state()).into_iter().map(|(k, _)| k).collect();
  assert_eq!(keys, vec!["web/svc"]);
}

#[tokio::test]
async fn dependency_cycle_applies_nothing() {
  let env = TestEnv::new();
  env.write_service_with_deps("a", "1", &["b/svc"]);
  env.write_service_with_deps("b", "2", &["a/svc"]);

  let err = env.cycle().await.unwrap_err();
  assert!(matches!(err, ReconcileError::Plan(_)));
  assert_eq!(err.kind(), ErrorKind::Parse);
  assert!(env.executor.take_calls().is_empty());
  assert!(env.snapshot_bytes().is_none());
}

#[tokio::test]
async fn unknown_dependency_is_ignored() {
  let env = TestEnv::new();
  env.write_service_with_deps("web", "1", &["ghost/svc"]);

  let report = env.cycle().await.unwrap();
  assert_eq!(report.plan.unknown_dependencies.len(), 1);
  assert_eq!(env.executor.take_calls(), vec!["apply web/svc"]);
}
