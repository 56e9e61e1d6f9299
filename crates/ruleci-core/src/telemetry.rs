//! Tracing setup for ruleci binaries.
//!
//! Logs go to stderr so stdout stays free for the printed run report.
//! `RUST_LOG` overrides the default filter.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested verbosity. Everything else
/// stays at `warn`.
const RULECI_TARGETS: &[&str] = &["ruleci", "ruleci_core", "ruleci_catalogs"];

/// Install the global subscriber. Only the first call in a process wins.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (text, json) = if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(RULECI_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.join(",")
}
