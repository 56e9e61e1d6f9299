//! Structured observability hooks for rule runs.
//!
//! Events carry a stable `event` field so they can be filtered in JSON log
//! output (`--json`). Failures are emitted at `warn!`, everything else at
//! `info!`.

use std::path::Path;

use tracing::{info, warn};

use crate::report::{Outcome, RunStatus};

pub fn emit_run_started(catalog: &str, category: &str, matched: usize, dry_run: bool, parallel: bool) {
    info!(
        event = "rules.run.started",
        catalog = %catalog,
        category = %category,
        matched = matched,
        dry_run = dry_run,
        parallel = parallel,
    );
}

/// A condition raised; the rule is recorded as failed and treated as non-matching.
pub fn emit_condition_failed(rule: &str, error: &dyn std::fmt::Display) {
    warn!(event = "rules.condition.failed", rule = %rule, error = %error);
}

/// Dry-run preview of a matched rule.
pub fn emit_rule_previewed(rule: &str, action: &str) {
    info!(event = "rules.rule.previewed", rule = %rule, action = %action);
}

pub fn emit_rule_finished(rule: &str, outcome: Outcome, duration_ms: u64, error: Option<&str>) {
    match error {
        Some(error) => warn!(
            event = "rules.rule.finished",
            rule = %rule,
            outcome = ?outcome,
            duration_ms = duration_ms,
            error = %error,
        ),
        None => info!(
            event = "rules.rule.finished",
            rule = %rule,
            outcome = ?outcome,
            duration_ms = duration_ms,
        ),
    }
}

pub fn emit_report_written(kind: &str, path: &Path) {
    info!(event = "rules.report.written", kind = %kind, path = %path.display());
}

pub fn emit_run_finished(catalog: &str, status: RunStatus, failed: usize, duration_ms: u64) {
    info!(
        event = "rules.run.finished",
        catalog = %catalog,
        status = ?status,
        failed = failed,
        duration_ms = duration_ms,
    );
}
