//! Process-wide atomic counters for rule runs.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    rules_evaluated: AtomicU64,
    rules_matched: AtomicU64,
    condition_failures: AtomicU64,
    actions_executed: AtomicU64,
    actions_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            rules_evaluated: AtomicU64::new(0),
            rules_matched: AtomicU64::new(0),
            condition_failures: AtomicU64::new(0),
            actions_executed: AtomicU64::new(0),
            actions_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_rules_evaluated(&self) {
        self.rules_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rules_matched(&self) {
        self.rules_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_condition_failures(&self) {
        self.condition_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_actions_executed(&self) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_actions_failed(&self) {
        self.actions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            rules_evaluated = self.rules_evaluated(),
            rules_matched = self.rules_matched(),
            condition_failures = self.condition_failures(),
            actions_executed = self.actions_executed(),
            actions_failed = self.actions_failed(),
        );
    }

    pub fn rules_evaluated(&self) -> u64 {
        self.rules_evaluated.load(Ordering::Relaxed)
    }

    pub fn rules_matched(&self) -> u64 {
        self.rules_matched.load(Ordering::Relaxed)
    }

    pub fn condition_failures(&self) -> u64 {
        self.condition_failures.load(Ordering::Relaxed)
    }

    pub fn actions_executed(&self) -> u64 {
        self.actions_executed.load(Ordering::Relaxed)
    }

    pub fn actions_failed(&self) -> u64 {
        self.actions_failed.load(Ordering::Relaxed)
    }
}
