//! Rule selection and execution.
//!
//! Selection is single-threaded and follows catalog declaration order.
//! Execution is either sequential, or dispatched onto a bounded pool where
//! each matched rule owns a pre-assigned result slot, so reports keep
//! selection order whatever the completion order.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{ActionError, ConditionError, EngineError, EngineResult};
use crate::metrics::METRICS;
use crate::obs::{
    emit_condition_failed, emit_rule_finished, emit_rule_previewed, emit_run_finished,
    emit_run_started,
};
use crate::registry::Registry;
use crate::report::{selection_digest, RuleResult, RunReport, RunStatus};
use crate::reporter::Reporter;
use crate::rule::{Catalog, Rule};

/// Selection verdict for one candidate rule.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Matched(Arc<Rule>),
    /// The condition raised; the rule does not match and is reported as failed.
    ConditionFailed {
        rule: Arc<Rule>,
        error: ConditionError,
    },
}

impl Evaluation {
    pub fn rule(&self) -> &Arc<Rule> {
        match self {
            Evaluation::Matched(rule) | Evaluation::ConditionFailed { rule, .. } => rule,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Evaluation::Matched(_))
    }
}

/// Evaluate the rules of `catalog` in `category` against `ctx`.
///
/// Rules whose condition is false are dropped. Rules whose condition errors
/// or panics are kept as [`Evaluation::ConditionFailed`] so the failure is
/// reported. Catalog order is preserved.
pub fn select(catalog: &Catalog, category: &str, ctx: &Context) -> Vec<Evaluation> {
    let mut out = Vec::new();
    for rule in catalog.rules().iter().filter(|r| r.category == category) {
        METRICS.inc_rules_evaluated();
        match evaluate_guarded(rule, ctx) {
            Ok(true) => {
                METRICS.inc_rules_matched();
                debug!(rule = %rule.name, condition = %rule.condition, "rule matched");
                out.push(Evaluation::Matched(Arc::clone(rule)));
            }
            Ok(false) => {
                debug!(rule = %rule.name, condition = %rule.condition, "rule did not match");
            }
            Err(error) => {
                METRICS.inc_condition_failures();
                emit_condition_failed(&rule.name, &error);
                out.push(Evaluation::ConditionFailed {
                    rule: Arc::clone(rule),
                    error,
                });
            }
        }
    }
    out
}

fn evaluate_guarded(rule: &Rule, ctx: &Context) -> Result<bool, ConditionError> {
    match panic::catch_unwind(AssertUnwindSafe(|| rule.condition.evaluate(ctx))) {
        Ok(verdict) => verdict,
        Err(payload) => Err(ConditionError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Looks up catalogs, selects rules and drives their actions.
pub struct RuleEngine {
    registry: Arc<Registry>,
    config: EngineConfig,
    reporter: Reporter,
}

impl RuleEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: Arc<Registry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            reporter: Reporter,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the `category` rules of the catalog named `catalog`.
    pub async fn run_rules(
        &self,
        ctx: &Context,
        category: &str,
        catalog: &str,
    ) -> EngineResult<RunReport> {
        let catalog = self.resolve(catalog)?;
        self.run_catalog(ctx, category, catalog).await
    }

    /// Run the `category` rules of the catalog named after `ctx.repository_name`.
    pub async fn run_rules_of_category(
        &self,
        category: &str,
        ctx: &Context,
    ) -> EngineResult<RunReport> {
        let catalog = self.resolve(&ctx.repository_name)?;
        self.run_catalog(ctx, category, catalog).await
    }

    fn resolve(&self, name: &str) -> EngineResult<Arc<Catalog>> {
        self.registry
            .catalog(name)
            .ok_or_else(|| EngineError::CatalogNotFound {
                name: name.to_string(),
            })
    }

    #[instrument(name = "ruleci.run", skip(self, ctx, catalog), fields(catalog = %catalog.name()))]
    async fn run_catalog(
        &self,
        ctx: &Context,
        category: &str,
        catalog: Arc<Catalog>,
    ) -> EngineResult<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let selection = select(&catalog, category, ctx);
        let matched: Vec<&str> = selection
            .iter()
            .filter(|e| e.is_matched())
            .map(|e| e.rule().name.as_str())
            .collect();
        let digest = selection_digest(matched.iter().copied());
        emit_run_started(
            catalog.name(),
            category,
            matched.len(),
            ctx.dry_run,
            ctx.parallel,
        );

        let results = self.execute(ctx, &selection).await;
        let status = RunStatus::aggregate(&results);

        let report = RunReport {
            run_id: Uuid::new_v4(),
            catalog: catalog.name().to_string(),
            category: category.to_string(),
            repository: ctx.repository_name.clone(),
            dry_run: ctx.dry_run,
            parallel: ctx.parallel,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            selection_digest: digest,
            results,
            status,
        };

        emit_run_finished(
            &report.catalog,
            report.status,
            report.failed_rules().len(),
            report.duration_ms,
        );
        METRICS.flush();

        if let Some((junit, json)) = ctx.report_paths() {
            if let Err(source) = self.reporter.write(&report, &junit, &json) {
                return Err(EngineError::ReportWrite {
                    source,
                    report: Box::new(report),
                });
            }
        }

        if report.is_success() {
            Ok(report)
        } else {
            Err(EngineError::RulesFailed {
                failed: report.failed_rules(),
                report: Box::new(report),
            })
        }
    }

    /// Produce one result per selection entry, in selection order.
    async fn execute(&self, ctx: &Context, selection: &[Evaluation]) -> Vec<RuleResult> {
        let mut slots: Vec<Option<RuleResult>> = vec![None; selection.len()];
        let mut pending: Vec<(usize, Arc<Rule>)> = Vec::new();

        for (slot, entry) in selection.iter().enumerate() {
            match entry {
                Evaluation::ConditionFailed { rule, error } => {
                    slots[slot] = Some(RuleResult::condition_failed(rule, error));
                }
                Evaluation::Matched(rule) if ctx.dry_run => {
                    emit_rule_previewed(&rule.name, &rule.action.describe());
                    slots[slot] = Some(RuleResult::skipped(rule));
                }
                Evaluation::Matched(rule) => pending.push((slot, Arc::clone(rule))),
            }
        }

        if ctx.parallel {
            self.execute_parallel(ctx, pending, &mut slots).await;
        } else {
            for (slot, rule) in pending {
                slots[slot] = Some(execute_rule(&rule, ctx).await);
            }
        }

        slots.into_iter().flatten().collect()
    }

    /// Dispatch level by level onto a pool of `max_parallel` permits. Within a
    /// level, permits are taken in selection order, so start order follows
    /// selection order.
    async fn execute_parallel(
        &self,
        ctx: &Context,
        pending: Vec<(usize, Arc<Rule>)>,
        slots: &mut [Option<RuleResult>],
    ) {
        let shared = Arc::new(ctx.clone());
        let sem = Arc::new(Semaphore::new(self.config.max_parallel));

        for level in dependency_levels(pending) {
            let mut tasks = Vec::with_capacity(level.len());

            for (slot, rule) in level {
                let permit = Arc::clone(&sem).acquire_owned().await.ok();
                let ctx = Arc::clone(&shared);
                let task_rule = Arc::clone(&rule);
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    execute_rule(&task_rule, &ctx).await
                });
                tasks.push((slot, rule, handle));
            }

            for (slot, rule, handle) in tasks {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        let error = ActionError::Panicked(e.to_string());
                        RuleResult::finished(&rule, 0, Some(error.to_string()))
                    }
                };
                slots[slot] = Some(result);
            }
        }
    }
}

/// Group matched rules into levels: a rule sits one level above the deepest
/// matched rule it depends on. Order within a level is selection order.
fn dependency_levels(pending: Vec<(usize, Arc<Rule>)>) -> Vec<Vec<(usize, Arc<Rule>)>> {
    let mut level_of: HashMap<String, usize> = HashMap::new();
    let mut levels: Vec<Vec<(usize, Arc<Rule>)>> = Vec::new();

    for (slot, rule) in pending {
        let level = rule
            .depends_on
            .iter()
            .filter_map(|dep| level_of.get(dep))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        level_of.insert(rule.name.clone(), level);
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push((slot, rule));
    }

    levels
}

async fn execute_rule(rule: &Rule, ctx: &Context) -> RuleResult {
    let start = Instant::now();
    METRICS.inc_actions_executed();

    let outcome = AssertUnwindSafe(rule.action.execute(ctx))
        .catch_unwind()
        .await;
    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(ActionError::Panicked(panic_message(payload.as_ref())).to_string()),
    };
    if error.is_some() {
        METRICS.inc_actions_failed();
    }

    let result = RuleResult::finished(rule, start.elapsed().as_millis() as u64, error);
    emit_rule_finished(
        &result.rule_name,
        result.outcome,
        result.duration_ms,
        result.error.as_deref(),
    );
    result
}
