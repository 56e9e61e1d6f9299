//! ruleci core library
//!
//! Change-aware rule engine for CI jobs: a per-run [`Context`], declarative
//! [`Rule`]s grouped into per-repository [`Catalog`]s, a read-only
//! [`Registry`], and the [`RuleEngine`] that selects, runs and reports them.

pub mod action;
pub mod command;
pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod obs;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod rule;
pub mod telemetry;

pub use action::{Action, CommandAction, FnAction, SequenceAction};
pub use command::{run_command, CommandOutput, CommandSpec};
pub use condition::Condition;
pub use config::{EngineConfig, DEFAULT_MAX_PARALLEL};
pub use context::{Context, DEFAULT_JSON_REPORT, DEFAULT_JUNIT_REPORT};
pub use engine::{select, Evaluation, RuleEngine};
pub use error::{
    ActionError, ConditionError, EngineError, EngineResult, RegistryLoadError, ReportWriteError,
};
pub use metrics::METRICS;
pub use registry::Registry;
pub use report::{selection_digest, Outcome, RuleResult, RunReport, RunStatus};
pub use reporter::{render_json, render_junit, Reporter, WrittenReports};
pub use rule::{Catalog, Rule};
pub use telemetry::init_tracing;

/// Crate version, shared by every workspace member.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
