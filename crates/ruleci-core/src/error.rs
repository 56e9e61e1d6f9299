//! Error taxonomy for the rule engine.
//!
//! Engine-level errors ([`RegistryLoadError`], [`EngineError::CatalogNotFound`])
//! stop a run. Rule-level errors ([`ConditionError`], [`ActionError`]) are
//! captured into the [`RunReport`] and the run continues.

use std::path::PathBuf;

use crate::report::RunReport;

/// Errors produced while building the [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryLoadError {
    #[error("catalog declared with an empty name")]
    EmptyCatalogName,

    #[error("catalog {name} is declared more than once")]
    DuplicateCatalog { name: String },

    #[error("rule {rule} declares catalog {declared} but was registered under {catalog}")]
    CatalogNameMismatch {
        catalog: String,
        rule: String,
        declared: String,
    },

    #[error("rule {rule} is declared more than once in catalog {catalog}")]
    DuplicateRule { catalog: String, rule: String },

    #[error("rule {rule} in catalog {catalog} depends on {dependency}, which is not declared before it")]
    UnknownDependency {
        catalog: String,
        rule: String,
        dependency: String,
    },
}

/// Errors raised by a rule condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition failed: {0}")]
    Failed(String),

    #[error("condition panicked: {0}")]
    Panicked(String),
}

/// Errors raised by a rule action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("step {step} exited with code {exit_code}{}", stderr_suffix(.stderr))]
    NonZeroExit {
        step: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("step {step} timed out after {timeout_secs} seconds")]
    Timeout { step: String, timeout_secs: u64 },

    #[error("required env vars not defined or empty: {}", .0.join(","))]
    MissingEnv(Vec<String>),

    #[error("required binaries not found in PATH: {}", .0.join(","))]
    MissingBinaries(Vec<String>),

    #[error("action panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let tail = stderr.trim();
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {tail}")
    }
}

/// Errors raised while persisting a report artifact.
#[derive(Debug, thiserror::Error)]
pub enum ReportWriteError {
    #[error("failed to write report {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by the [`RuleEngine`](crate::RuleEngine) entry points.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("catalog not found: {name:?}")]
    CatalogNotFound { name: String },

    #[error("{} of {} rule(s) failed: {}", .failed.len(), .report.results.len(), .failed.join(", "))]
    RulesFailed {
        failed: Vec<String>,
        report: Box<RunReport>,
    },

    #[error("rules ran but the report could not be written: {source}")]
    ReportWrite {
        #[source]
        source: ReportWriteError,
        report: Box<RunReport>,
    },
}

impl EngineError {
    /// The report collected before the error, if the run got that far.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            EngineError::CatalogNotFound { .. } => None,
            EngineError::RulesFailed { report, .. } | EngineError::ReportWrite { report, .. } => {
                Some(report.as_ref())
            }
        }
    }
}

/// Result type for engine entry points.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_includes_trimmed_stderr() {
        let err = ActionError::NonZeroExit {
            step: "ginkgo".to_string(),
            exit_code: 2,
            stderr: "  boom\n".to_string(),
        };
        assert_eq!(err.to_string(), "step ginkgo exited with code 2: boom");
    }

    #[test]
    fn non_zero_exit_without_stderr() {
        let err = ActionError::NonZeroExit {
            step: "ginkgo".to_string(),
            exit_code: 1,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "step ginkgo exited with code 1");
    }

    #[test]
    fn missing_env_lists_all_names() {
        let err = ActionError::MissingEnv(vec!["GITHUB_TOKEN".into(), "QUAY_TOKEN".into()]);
        assert!(err.to_string().ends_with("GITHUB_TOKEN,QUAY_TOKEN"));
    }

    #[test]
    fn catalog_not_found_has_no_report() {
        let err = EngineError::CatalogNotFound {
            name: "unknown".to_string(),
        };
        assert!(err.report().is_none());
    }
}
