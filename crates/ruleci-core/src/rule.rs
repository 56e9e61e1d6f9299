//! Rules and the catalogs that own them.

use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::condition::Condition;

/// A named, declarative unit: condition, action and classification.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub description: String,

    /// Cross-cutting classification such as `tests`, `ci` or `demo`.
    pub category: String,

    /// Catalog this rule declares itself part of.
    pub catalog: String,

    pub labels: Vec<String>,

    /// Earlier rules of the same catalog that must finish first when running
    /// in parallel.
    pub depends_on: Vec<String>,

    pub condition: Condition,
    pub action: Arc<dyn Action>,
}

impl Rule {
    /// Create a rule that always matches; narrow it with [`Rule::when`].
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        catalog: impl Into<String>,
        action: impl Action + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: category.into(),
            catalog: catalog.into(),
            labels: Vec::new(),
            depends_on: Vec::new(),
            condition: Condition::Always,
            action: Arc::new(action),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn after(mut self, rule: impl Into<String>) -> Self {
        self.depends_on.push(rule.into());
        self
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("catalog", &self.catalog)
            .field("labels", &self.labels)
            .field("depends_on", &self.depends_on)
            .field("condition", &self.condition)
            .field("action", &self.action.describe())
            .finish()
    }
}

/// An ordered collection of rules for one target repository.
///
/// Immutable once handed to the [`Registry`](crate::Registry).
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    rules: Vec<Arc<Rule>>,
}

impl Catalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule, keeping declaration order.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Distinct categories in first-declaration order.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !out.contains(&rule.category.as_str()) {
                out.push(&rule.category);
            }
        }
        out
    }
}
