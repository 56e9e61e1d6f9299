//! The `Action` capability and its generic variants.
//!
//! Each declared CI step is a type implementing [`Action`], chosen when the
//! rule is registered. The engine invokes actions as opaque callables.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::command::{run_command, CommandSpec};
use crate::context::Context;
use crate::error::ActionError;

/// Side-effecting operation run when a rule is selected.
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, ctx: &Context) -> Result<(), ActionError>;

    /// One-line description used in dry-run previews and logs.
    fn describe(&self) -> String {
        "custom action".to_string()
    }
}

/// Run an external command.
#[derive(Debug, Clone)]
pub struct CommandAction {
    pub spec: CommandSpec,
}

impl CommandAction {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn execute(&self, _ctx: &Context) -> Result<(), ActionError> {
        let output = run_command(&self.spec).await?.into_result()?;
        info!(step = %output.name, duration_ms = output.duration_ms, "step finished");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("run `{}`", self.spec.command.join(" "))
    }
}

/// Run steps in order, stopping at the first failure.
#[derive(Clone, Default)]
pub struct SequenceAction {
    steps: Vec<Arc<dyn Action>>,
}

impl SequenceAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: impl Action + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl Action for SequenceAction {
    async fn execute(&self, ctx: &Context) -> Result<(), ActionError> {
        for step in &self.steps {
            step.execute(ctx).await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Debug for SequenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceAction")
            .field("steps", &self.describe())
            .finish()
    }
}

/// Closure-backed action, for in-process steps and tests.
pub struct FnAction<F> {
    name: String,
    f: F,
}

impl<F> FnAction<F>
where
    F: Fn(&Context) -> Result<(), ActionError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&Context) -> Result<(), ActionError> + Send + Sync,
{
    async fn execute(&self, ctx: &Context) -> Result<(), ActionError> {
        (self.f)(ctx)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
