//! Rule catalogs for the repositories under end-to-end validation.
//!
//! Each repository contributes one catalog named after it. [`declarations`]
//! lists them all and [`load_registry`] turns them into the engine's
//! [`Registry`].

pub mod catalogs;
pub mod steps;

use ruleci_core::{Catalog, Registry, RegistryLoadError};

/// Rules that run the repository's own validation in its CI job.
pub const CI: &str = "ci";

/// Change-driven test selection.
pub const TESTS: &str = "tests";

/// Walk-through rules that only log what they would do.
pub const DEMO: &str = "demo";

/// Every catalog, in registration order.
pub fn declarations() -> Vec<Catalog> {
    let mut out = vec![
        catalogs::e2e_tests::catalog(),
        catalogs::infra_deployments::catalog(),
        catalogs::release_service_catalog::catalog(),
    ];
    out.extend(catalogs::components::catalogs());
    out
}

/// Build the registry from [`declarations`].
pub fn load_registry() -> Result<Registry, RegistryLoadError> {
    Registry::load(declarations())
}
