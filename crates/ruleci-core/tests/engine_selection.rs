//! Rule selection: category and catalog filtering, change-based conditions,
//! catalog resolution and condition failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ruleci_core::{
    select, Catalog, Condition, ConditionError, Context, EngineError, FnAction, Outcome, Registry,
    Rule, RuleEngine,
};

const INFRA: &str = "infra-deployments";

fn noop_rule(name: &str, category: &str, catalog: &str) -> Rule {
    Rule::new(name, category, catalog, FnAction::new(name, |_| Ok(())))
}

fn engine(catalogs: Vec<Catalog>) -> RuleEngine {
    RuleEngine::new(Arc::new(Registry::load(catalogs).unwrap()))
}

fn infra_catalog() -> Catalog {
    Catalog::new(INFRA)
        .with_rule(noop_rule("A", "tests", INFRA))
        .with_rule(noop_rule("B", "ci", INFRA))
}

fn result_names(report: &ruleci_core::RunReport) -> Vec<&str> {
    report.results.iter().map(|r| r.rule_name.as_str()).collect()
}

#[tokio::test]
async fn test_explicit_catalog_filters_by_category() {
    let engine = engine(vec![infra_catalog()]);
    let ctx = Context::new("somewhere-else");

    let report = engine.run_rules(&ctx, "tests", INFRA).await.unwrap();

    assert_eq!(result_names(&report), vec!["A"]);
    assert_eq!(report.catalog, INFRA);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_category_run_resolves_catalog_from_repository() {
    let engine = engine(vec![infra_catalog()]);
    let ctx = Context::new(INFRA);

    let report = engine.run_rules_of_category("ci", &ctx).await.unwrap();

    assert_eq!(result_names(&report), vec!["B"]);
    assert_eq!(report.results[0].outcome, Outcome::Success);
}

#[tokio::test]
async fn test_unknown_catalog_produces_no_report() {
    let engine = engine(vec![infra_catalog()]);
    let ctx = Context::new(INFRA);

    let err = engine
        .run_rules(&ctx, "tests", "unknown-catalog")
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        EngineError::CatalogNotFound { name } if name == "unknown-catalog"
    ));
    assert!(err.report().is_none());
}

#[tokio::test]
async fn test_unresolvable_repository_is_catalog_not_found() {
    let engine = engine(vec![infra_catalog()]);

    let err = engine
        .run_rules_of_category("ci", &Context::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CatalogNotFound { .. }));
}

#[test]
fn test_changed_files_drive_selection() {
    let catalog = Catalog::new("e2e-tests")
        .with_rule(
            noop_rule("release", "tests", "e2e-tests")
                .when(Condition::changed_under("tests/release/")),
        )
        .with_rule(noop_rule("docs", "tests", "e2e-tests").when(Condition::changed_under("docs/")));
    let ctx = Context::new("e2e-tests").with_changed_files(["tests/release/foo.go"]);

    let selection = select(&catalog, "tests", &ctx);

    assert_eq!(selection.len(), 1);
    assert!(selection[0].is_matched());
    assert_eq!(selection[0].rule().name, "release");
}

#[test]
fn test_selection_is_idempotent_and_ordered() {
    let catalog = Catalog::new("e2e-tests")
        .with_rule(noop_rule("c", "tests", "e2e-tests"))
        .with_rule(noop_rule("a", "tests", "e2e-tests").when(Condition::Paired))
        .with_rule(noop_rule("b", "tests", "e2e-tests"))
        .with_rule(noop_rule("d", "tests", "e2e-tests").when(Condition::Never));
    let mut ctx = Context::new("e2e-tests");
    ctx.is_paired = true;

    let names = |ctx: &Context| -> Vec<String> {
        select(&catalog, "tests", ctx)
            .iter()
            .map(|e| e.rule().name.clone())
            .collect()
    };

    let first = names(&ctx);
    let second = names(&ctx);
    assert_eq!(first, vec!["c", "a", "b"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_condition_error_is_recorded_and_run_continues() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);

    let catalog = Catalog::new("e2e-tests")
        .with_rule(
            noop_rule("broken", "tests", "e2e-tests").when(Condition::custom("job-spec", |_| {
                Err(ConditionError::Failed("JOB_SPEC is not valid JSON".to_string()))
            })),
        )
        .with_rule(Rule::new(
            "healthy",
            "tests",
            "e2e-tests",
            FnAction::new("count", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ));
    let engine = engine(vec![catalog]);

    let err = engine
        .run_rules_of_category("tests", &Context::new("e2e-tests"))
        .await
        .unwrap_err();

    let report = err.report().expect("rule failures carry the report");
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(result_names(report), vec!["broken", "healthy"]);

    let broken = &report.results[0];
    assert!(!broken.matched);
    assert!(!broken.ran);
    assert_eq!(broken.outcome, Outcome::Failure);
    assert!(broken.error.as_deref().unwrap().contains("JOB_SPEC"));

    assert!(matches!(err, EngineError::RulesFailed { ref failed, .. } if failed == &["broken"]));
}

#[tokio::test]
async fn test_panicking_condition_does_not_abort_run() {
    let catalog = Catalog::new("e2e-tests")
        .with_rule(
            noop_rule("panics", "tests", "e2e-tests")
                .when(Condition::custom("explodes", |_| panic!("index out of range"))),
        )
        .with_rule(noop_rule("after", "tests", "e2e-tests"));
    let engine = engine(vec![catalog]);

    let err = engine
        .run_rules_of_category("tests", &Context::new("e2e-tests"))
        .await
        .unwrap_err();
    let report = err.report().unwrap();

    assert_eq!(report.results[0].outcome, Outcome::Failure);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("index out of range"));
    assert_eq!(report.results[1].outcome, Outcome::Success);
}

#[tokio::test]
async fn test_empty_selection_succeeds() {
    let engine = engine(vec![infra_catalog()]);

    let report = engine
        .run_rules(&Context::new(INFRA), "demo", INFRA)
        .await
        .unwrap();

    assert!(report.results.is_empty());
    assert!(report.is_success());
}

#[tokio::test]
async fn test_selection_digest_tracks_matched_rules() {
    let engine = engine(vec![infra_catalog()]);
    let ctx = Context::new(INFRA);

    let a = engine.run_rules(&ctx, "tests", INFRA).await.unwrap();
    let b = engine.run_rules(&ctx, "tests", INFRA).await.unwrap();
    let c = engine.run_rules(&ctx, "ci", INFRA).await.unwrap();

    assert_eq!(a.selection_digest, b.selection_digest);
    assert_ne!(a.selection_digest, c.selection_digest);
    assert_ne!(a.run_id, b.run_id);
}
