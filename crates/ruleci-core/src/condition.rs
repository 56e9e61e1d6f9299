//! Declarative predicates over a [`Context`].
//!
//! Conditions are pure: they inspect the context and never mutate it or
//! perform I/O. `All` and `Any` short-circuit in declaration order and stop
//! at the first error.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::context::Context;
use crate::error::ConditionError;

/// Closure signature accepted by [`Condition::Custom`].
pub type Predicate = Arc<dyn Fn(&Context) -> Result<bool, ConditionError> + Send + Sync>;

/// A predicate deciding whether a rule applies to a run.
#[derive(Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    Never,
    /// Some changed file lives under the given directory prefix.
    ChangedUnder(String),
    /// Some changed file matches the pattern.
    ChangedMatching(Regex),
    /// The change set is empty.
    NoChanges,
    Repository(String),
    JobType(String),
    JobNameContains(String),
    EventType(String),
    /// The companion repository has a matching in-flight PR.
    Paired,
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
    Custom { name: String, predicate: Predicate },
}

impl Condition {
    pub fn changed_under(prefix: impl Into<String>) -> Self {
        Condition::ChangedUnder(prefix.into())
    }

    /// Compile `pattern` into a [`Condition::ChangedMatching`].
    pub fn changed_matching(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Condition::ChangedMatching)
    }

    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// None of the given conditions hold.
    pub fn none(conditions: Vec<Condition>) -> Self {
        Condition::not(Condition::Any(conditions))
    }

    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Context) -> Result<bool, ConditionError> + Send + Sync + 'static,
    {
        Condition::Custom {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate against `ctx`.
    pub fn evaluate(&self, ctx: &Context) -> Result<bool, ConditionError> {
        match self {
            Condition::Always => Ok(true),
            Condition::Never => Ok(false),
            Condition::ChangedUnder(prefix) => Ok(ctx.any_changed_under(prefix)),
            Condition::ChangedMatching(re) => {
                Ok(ctx.changed_files().iter().any(|f| re.is_match(f)))
            }
            Condition::NoChanges => Ok(ctx.changed_files().is_empty()),
            Condition::Repository(name) => Ok(&ctx.repository_name == name),
            Condition::JobType(job_type) => Ok(&ctx.job_type == job_type),
            Condition::JobNameContains(fragment) => Ok(ctx.job_name.contains(fragment.as_str())),
            Condition::EventType(event) => Ok(&ctx.event_type == event),
            Condition::Paired => Ok(ctx.is_paired),
            Condition::All(conditions) => {
                for c in conditions {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any(conditions) => {
                for c in conditions {
                    if c.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(inner) => inner.evaluate(ctx).map(|b| !b),
            Condition::Custom { predicate, .. } => predicate(ctx),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, op: &str, items: &[Condition]) -> fmt::Result {
            write!(f, "{op}(")?;
            for (i, c) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, ")")
        }

        match self {
            Condition::Always => write!(f, "always"),
            Condition::Never => write!(f, "never"),
            Condition::ChangedUnder(p) => write!(f, "changed_under({p})"),
            Condition::ChangedMatching(re) => write!(f, "changed_matching({})", re.as_str()),
            Condition::NoChanges => write!(f, "no_changes"),
            Condition::Repository(r) => write!(f, "repository({r})"),
            Condition::JobType(t) => write!(f, "job_type({t})"),
            Condition::JobNameContains(s) => write!(f, "job_name_contains({s})"),
            Condition::EventType(e) => write!(f, "event_type({e})"),
            Condition::Paired => write!(f, "paired"),
            Condition::All(items) => join(f, "all", items),
            Condition::Any(items) => join(f, "any", items),
            Condition::Not(inner) => write!(f, "not({inner})"),
            Condition::Custom { name, .. } => write!(f, "custom({name})"),
        }
    }
}
