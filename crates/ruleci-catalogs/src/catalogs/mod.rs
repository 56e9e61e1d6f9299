//! Per-repository catalog declarations.

pub mod components;
pub mod infra_deployments;
pub mod release_service_catalog;

use ruleci_core::{Rule, SequenceAction};

use crate::steps::{RequireBinaries, RequireEnv, PREFLIGHT_BINARIES, PREFLIGHT_ENV};
use crate::CI;

/// Name of the preflight rule every CI catalog starts with.
pub const PREFLIGHT: &str = "preflight";

/// Secrets and tools check that CI suites declare a dependency on.
pub(crate) fn preflight(catalog: &str) -> Rule {
    Rule::new(
        PREFLIGHT,
        CI,
        catalog,
        SequenceAction::new()
            .then(RequireEnv::new(PREFLIGHT_ENV.iter().copied()))
            .then(RequireBinaries::new(PREFLIGHT_BINARIES.iter().copied())),
    )
    .with_description("verify required secrets and tools before running suites")
}
