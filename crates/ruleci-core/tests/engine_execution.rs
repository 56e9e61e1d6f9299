//! Rule execution: dry-run, sequential and parallel modes, failure
//! aggregation and report emission.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ruleci_core::{
    Action, ActionError, Catalog, Context, EngineConfig, EngineError, Outcome, Registry, Reporter,
    Rule, RuleEngine, RunReport, RunStatus,
};

const CATALOG: &str = "e2e-tests";

/// Records start and finish order and peak concurrency.
#[derive(Default)]
struct Journal {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

struct Step {
    name: String,
    delay_ms: u64,
    fail: bool,
    journal: Arc<Journal>,
}

#[async_trait]
impl Action for Step {
    async fn execute(&self, _ctx: &Context) -> Result<(), ActionError> {
        self.journal.started.lock().unwrap().push(self.name.clone());
        let now = self.journal.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        self.journal.running.fetch_sub(1, Ordering::SeqCst);
        self.journal.finished.lock().unwrap().push(self.name.clone());
        if self.fail {
            Err(ActionError::Failed(format!("{} failed", self.name)))
        } else {
            Ok(())
        }
    }

    fn describe(&self) -> String {
        format!("step {}", self.name)
    }
}

fn step(journal: &Arc<Journal>, name: &str, delay_ms: u64, fail: bool) -> Rule {
    Rule::new(
        name,
        "tests",
        CATALOG,
        Step {
            name: name.to_string(),
            delay_ms,
            fail,
            journal: Arc::clone(journal),
        },
    )
}

fn engine(catalog: Catalog, max_parallel: usize) -> RuleEngine {
    RuleEngine::with_config(
        Arc::new(Registry::load([catalog]).unwrap()),
        EngineConfig::default().with_max_parallel(max_parallel),
    )
}

fn names(report: &RunReport) -> Vec<&str> {
    report.results.iter().map(|r| r.rule_name.as_str()).collect()
}

#[tokio::test]
async fn test_dry_run_previews_without_side_effects() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(step(&journal, "a", 0, false))
        .with_rule(step(&journal, "b", 0, true));
    let engine = engine(catalog, 4);

    for parallel in [false, true] {
        let mut ctx = Context::new(CATALOG);
        ctx.dry_run = true;
        ctx.parallel = parallel;

        let report = engine.run_rules_of_category("tests", &ctx).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.status, RunStatus::Success);
        for result in &report.results {
            assert!(!result.ran);
            assert_eq!(result.outcome, Outcome::Skipped);
        }
    }
    assert!(journal.started.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_sequential_run_continues_after_failure() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(step(&journal, "first", 0, false))
        .with_rule(step(&journal, "second", 0, true))
        .with_rule(step(&journal, "third", 0, false));
    let engine = engine(catalog, 4);

    let err = engine
        .run_rules_of_category("tests", &Context::new(CATALOG))
        .await
        .unwrap_err();

    assert_eq!(
        *journal.started.lock().unwrap(),
        vec!["first", "second", "third"]
    );
    let EngineError::RulesFailed { failed, report } = err else {
        panic!("expected RulesFailed");
    };
    assert_eq!(failed, vec!["second"]);
    assert_eq!(report.status, RunStatus::Failure);
    assert_eq!(report.results[1].error.as_deref(), Some("second failed"));
    assert!(report.results.iter().all(|r| r.ran));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_keeps_selection_order_in_report() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(step(&journal, "slow", 80, false))
        .with_rule(step(&journal, "medium", 40, false))
        .with_rule(step(&journal, "fast", 0, false));
    let engine = engine(catalog, 4);

    let sequential = engine
        .run_rules_of_category("tests", &Context::new(CATALOG))
        .await
        .unwrap();

    let mut ctx = Context::new(CATALOG);
    ctx.parallel = true;
    let parallel = engine.run_rules_of_category("tests", &ctx).await.unwrap();

    assert_eq!(names(&sequential), names(&parallel));
    assert_eq!(names(&parallel), vec!["slow", "medium", "fast"]);
    assert_eq!(sequential.selection_digest, parallel.selection_digest);

    let started = journal.started.lock().unwrap();
    assert_eq!(&started[..3], &["slow", "medium", "fast"]);
    let mut parallel_started = started[3..].to_vec();
    parallel_started.sort();
    assert_eq!(parallel_started, vec!["fast", "medium", "slow"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_respects_pool_size() {
    let journal = Arc::new(Journal::default());
    let mut catalog = Catalog::new(CATALOG);
    for i in 0..6 {
        catalog = catalog.with_rule(step(&journal, &format!("rule-{i}"), 30, false));
    }
    let engine = engine(catalog, 2);

    let mut ctx = Context::new(CATALOG);
    ctx.parallel = true;
    let report = engine.run_rules_of_category("tests", &ctx).await.unwrap();

    assert_eq!(report.results.len(), 6);
    assert!(journal.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(journal.finished.lock().unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_waits_for_all_despite_failure() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(step(&journal, "fails-fast", 0, true))
        .with_rule(step(&journal, "slow", 50, false));
    let engine = engine(catalog, 4);

    let mut ctx = Context::new(CATALOG);
    ctx.parallel = true;
    let err = engine.run_rules_of_category("tests", &ctx).await.unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(report.results[0].outcome, Outcome::Failure);
    assert_eq!(report.results[1].outcome, Outcome::Success);
    assert_eq!(journal.finished.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dependents_start_after_their_dependencies() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(step(&journal, "preflight", 40, true))
        .with_rule(step(&journal, "suite", 0, false).after("preflight"))
        .with_rule(step(&journal, "lint", 0, false));
    let engine = engine(catalog, 4);

    let mut ctx = Context::new(CATALOG);
    ctx.parallel = true;
    let err = engine.run_rules_of_category("tests", &ctx).await.unwrap_err();

    let finished = journal.finished.lock().unwrap();
    let pos = |n: &str| finished.iter().position(|f| f == n).unwrap();
    assert!(pos("preflight") < pos("suite"));

    // a failed dependency does not cancel its dependents
    let report = err.report().unwrap();
    assert_eq!(names(report), vec!["preflight", "suite", "lint"]);
    assert_eq!(report.results[1].outcome, Outcome::Success);
}

struct Panics;

#[async_trait]
impl Action for Panics {
    async fn execute(&self, _ctx: &Context) -> Result<(), ActionError> {
        panic!("kubeconfig missing")
    }
}

#[tokio::test]
async fn test_panicking_action_is_a_failure() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(Rule::new("panics", "tests", CATALOG, Panics))
        .with_rule(step(&journal, "next", 0, false));
    let engine = engine(catalog, 4);

    for parallel in [false, true] {
        let mut ctx = Context::new(CATALOG);
        ctx.parallel = parallel;
        let err = engine.run_rules_of_category("tests", &ctx).await.unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.results[0].outcome, Outcome::Failure);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("kubeconfig missing"));
        assert_eq!(report.results[1].outcome, Outcome::Success);
    }
}

#[tokio::test]
async fn test_single_failure_yields_one_junit_failure() {
    let journal = Arc::new(Journal::default());
    let catalog = Catalog::new(CATALOG)
        .with_rule(step(&journal, "ok-1", 0, false))
        .with_rule(step(&journal, "broken", 0, true))
        .with_rule(step(&journal, "ok-2", 0, false));
    let engine = engine(catalog, 4);

    let dir = tempfile::tempdir().unwrap();
    let mut ctx = Context::new(CATALOG);
    ctx.output_directory = Some(dir.path().join("artifacts"));

    let err = engine.run_rules_of_category("tests", &ctx).await.unwrap_err();
    assert_eq!(err.report().unwrap().status, RunStatus::Failure);

    let (junit, json) = ctx.report_paths().unwrap();
    let xml = std::fs::read_to_string(&junit).unwrap();
    assert_eq!(xml.matches("<failure ").count(), 1);
    assert_eq!(xml.matches("<testcase ").count(), 3);
    assert!(xml.contains("name=\"broken\""));

    let parsed = Reporter.read_json(&json).unwrap();
    assert_eq!(parsed, err.report().unwrap().results);
}

#[tokio::test]
async fn test_no_reports_without_output_directory() {
    let journal = Arc::new(Journal::default());
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::new(CATALOG).with_rule(step(&journal, "only", 0, false));
    let engine = engine(catalog, 4);

    let mut ctx = Context::new(CATALOG);
    ctx.junit_report_path = dir.path().join("never.xml");
    engine.run_rules_of_category("tests", &ctx).await.unwrap();

    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_report_write_failure_keeps_results() {
    let journal = Arc::new(Journal::default());
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let catalog = Catalog::new(CATALOG).with_rule(step(&journal, "only", 0, false));
    let engine = engine(catalog, 4);

    let mut ctx = Context::new(CATALOG);
    ctx.output_directory = Some(blocker);
    let err = engine.run_rules_of_category("tests", &ctx).await.unwrap_err();

    assert!(matches!(err, EngineError::ReportWrite { .. }));
    let report = err.report().unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome, Outcome::Success);
}
