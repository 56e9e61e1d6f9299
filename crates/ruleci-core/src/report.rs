//! Per-rule outcomes and the aggregated run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::rule::Rule;

/// Outcome of a single rule in a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

/// Record of what happened to one rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleResult {
    pub rule_name: String,
    pub category: String,
    pub catalog: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub matched: bool,
    pub ran: bool,
    pub outcome: Outcome,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleResult {
    fn for_rule(rule: &Rule) -> Self {
        Self {
            rule_name: rule.name.clone(),
            category: rule.category.clone(),
            catalog: rule.catalog.clone(),
            labels: rule.labels.clone(),
            matched: true,
            ran: false,
            outcome: Outcome::Skipped,
            duration_ms: 0,
            error: None,
        }
    }

    /// Matched under dry-run: the action was not invoked.
    pub fn skipped(rule: &Rule) -> Self {
        Self::for_rule(rule)
    }

    /// The condition raised, so the rule counts as non-matching and failed.
    pub fn condition_failed(rule: &Rule, error: impl ToString) -> Self {
        Self {
            matched: false,
            outcome: Outcome::Failure,
            error: Some(error.to_string()),
            ..Self::for_rule(rule)
        }
    }

    /// The action ran to completion, successfully or not.
    pub fn finished(rule: &Rule, duration_ms: u64, error: Option<String>) -> Self {
        Self {
            ran: true,
            outcome: if error.is_some() {
                Outcome::Failure
            } else {
                Outcome::Success
            },
            duration_ms,
            error,
            ..Self::for_rule(rule)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }
}

/// Aggregated status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    /// Success only when no entry failed. Dry-run skips do not count as
    /// failures; every non-dry-run matched rule is either a success or a
    /// failure.
    pub fn aggregate(results: &[RuleResult]) -> Self {
        if results.iter().any(RuleResult::is_failure) {
            RunStatus::Failure
        } else {
            RunStatus::Success
        }
    }
}

/// Ordered outcome record for one engine invocation.
///
/// `results` follow catalog declaration order regardless of how actions were
/// scheduled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub catalog: String,
    pub category: String,
    pub repository: String,
    pub dry_run: bool,
    pub parallel: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// SHA-256 over the ordered names of the matched rules.
    pub selection_digest: String,
    pub results: Vec<RuleResult>,
    pub status: RunStatus,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn failed_rules(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.rule_name.clone())
            .collect()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Deterministic digest of an ordered list of rule names.
pub fn selection_digest<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: Outcome) -> RuleResult {
        RuleResult {
            rule_name: name.to_string(),
            category: "tests".to_string(),
            catalog: "e2e-tests".to_string(),
            labels: vec![],
            matched: outcome != Outcome::Failure,
            ran: outcome != Outcome::Skipped,
            outcome,
            duration_ms: 10,
            error: None,
        }
    }

    #[test]
    fn aggregate_fails_on_any_failure() {
        let results = vec![
            result("a", Outcome::Success),
            result("b", Outcome::Failure),
            result("c", Outcome::Success),
        ];
        assert_eq!(RunStatus::aggregate(&results), RunStatus::Failure);
    }

    #[test]
    fn aggregate_treats_dry_run_skips_as_success() {
        let results = vec![result("a", Outcome::Skipped), result("b", Outcome::Skipped)];
        assert_eq!(RunStatus::aggregate(&results), RunStatus::Success);
        assert_eq!(RunStatus::aggregate(&[]), RunStatus::Success);
    }

    #[test]
    fn selection_digest_is_order_sensitive() {
        let a = selection_digest(["fmt", "check"]);
        let b = selection_digest(["fmt", "check"]);
        let c = selection_digest(["check", "fmt"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&Outcome::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }

    #[test]
    fn error_field_omitted_when_absent() {
        let v = serde_json::to_value(result("a", Outcome::Success)).unwrap();
        assert!(v.get("error").is_none());
        assert_eq!(v["outcome"], "success");
    }
}
