//! Engine configuration.

/// Default size of the worker pool used for parallel runs.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Tunables for a [`RuleEngine`](crate::RuleEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of actions running at once when `parallel` is set.
    pub max_parallel: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

impl EngineConfig {
    /// Set the worker-pool size. Values below 1 are raised to 1.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }
}
