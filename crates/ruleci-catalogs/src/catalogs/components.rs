//! Catalogs for the platform's service repositories.
//!
//! Every service runs the same CI shape: preflight, then the suite tagged
//! with the service's label, built against the PR's fork.

use ruleci_core::{Catalog, Rule};

use super::{preflight, PREFLIGHT};
use crate::steps::GinkgoSuite;
use crate::CI;

/// Service repository, suite label, and the variables its suite reads to
/// locate the code under test.
const SERVICES: &[(&str, &str, &str, &str)] = &[
    (
        "build-service",
        "build-service",
        "BUILD_SERVICE_PR_URL",
        "BUILD_SERVICE_PR_REVISION",
    ),
    (
        "image-controller",
        "image-controller",
        "IMAGE_CONTROLLER_PR_URL",
        "IMAGE_CONTROLLER_PR_REVISION",
    ),
    (
        "integration-service",
        "integration-service",
        "INTEGRATION_SERVICE_PR_URL",
        "INTEGRATION_SERVICE_PR_REVISION",
    ),
    (
        "release-service",
        "release-service",
        "RELEASE_SERVICE_PR_URL",
        "RELEASE_SERVICE_PR_REVISION",
    ),
];

/// Names of the service catalogs.
pub fn names() -> impl Iterator<Item = &'static str> {
    SERVICES.iter().map(|(repo, ..)| *repo)
}

pub fn catalogs() -> Vec<Catalog> {
    SERVICES
        .iter()
        .map(|(repo, label, url_var, revision_var)| {
            let suite =
                GinkgoSuite::labelled(*label, *label).with_pr_source(*repo, *url_var, *revision_var);
            Catalog::new(*repo).with_rule(preflight(repo)).with_rule(
                Rule::new(format!("{label}-suite"), CI, *repo, suite)
                    .after(PREFLIGHT)
                    .labels([*label]),
            )
        })
        .collect()
}
