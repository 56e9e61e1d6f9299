//! Catalog for the platform deployment manifests.
//!
//! A component's manifests map onto the suite that exercises it. Changes to
//! cluster-wide configuration select the full suite.

use ruleci_core::{Catalog, Condition, Rule};

use super::{preflight, PREFLIGHT};
use crate::steps::GinkgoSuite;
use crate::{CI, TESTS};

pub const NAME: &str = "infra-deployments";

/// Component manifest directories and the suite label covering each.
const COMPONENTS: &[(&str, &str)] = &[
    ("components/build-service/", "build-service"),
    ("components/image-controller/", "image-controller"),
    ("components/integration/", "integration-service"),
    ("components/release/", "release-service"),
    ("components/enterprise-contract/", "ec"),
];

/// Cluster-wide configuration shared by every component.
const PLATFORM_PATHS: &[&str] = &["argo-cd-apps/", "hack/", "configs/"];

fn platform_changed() -> Condition {
    Condition::Any(
        PLATFORM_PATHS
            .iter()
            .map(|p| Condition::changed_under(*p))
            .collect(),
    )
}

pub fn catalog() -> Catalog {
    let mut catalog = Catalog::new(NAME);

    for (dir, label) in COMPONENTS {
        catalog = catalog.with_rule(
            Rule::new(
                format!("{label}-tests"),
                TESTS,
                NAME,
                GinkgoSuite::labelled(*label, *label),
            )
            .when(Condition::changed_under(*dir))
            .labels([*label])
            .with_description(format!("manifests under {dir} changed")),
        );
    }

    catalog
        .with_rule(
            Rule::new("platform-tests", TESTS, NAME, GinkgoSuite::full("platform"))
                .when(platform_changed())
                .with_description("cluster-wide configuration changed, run every suite"),
        )
        .with_rule(preflight(NAME))
        .with_rule(
            Rule::new("deployment-suite", CI, NAME, GinkgoSuite::full("infra"))
                .after(PREFLIGHT)
                .when(Condition::not(Condition::NoChanges)),
        )
}
