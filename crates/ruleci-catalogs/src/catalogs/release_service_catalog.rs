//! Catalog for the release pipelines and tasks repository.

use ruleci_core::{Catalog, Condition, Rule};

use super::{preflight, PREFLIGHT};
use crate::steps::GinkgoSuite;
use crate::{CI, TESTS};

pub const NAME: &str = "release-service-catalog";

/// Label of the specs exercising the catalog's pipelines.
pub const RELEASE_PIPELINES_LABEL: &str = "release-pipelines";

const URL_VAR: &str = "RELEASE_SERVICE_CATALOG_URL";
const REVISION_VAR: &str = "RELEASE_SERVICE_CATALOG_REVISION";

fn pipelines_changed() -> Condition {
    Condition::Any(vec![
        Condition::changed_under("pipelines/"),
        Condition::changed_under("tasks/"),
        Condition::changed_under("integration-tests/"),
    ])
}

fn release_pipelines() -> GinkgoSuite {
    GinkgoSuite::labelled(RELEASE_PIPELINES_LABEL, RELEASE_PIPELINES_LABEL)
        .with_pr_source(NAME, URL_VAR, REVISION_VAR)
}

pub fn catalog() -> Catalog {
    Catalog::new(NAME)
        .with_rule(
            Rule::new("release-pipelines", TESTS, NAME, release_pipelines())
                .when(pipelines_changed())
                .labels([RELEASE_PIPELINES_LABEL]),
        )
        .with_rule(
            Rule::new(
                "paired-release-service",
                TESTS,
                NAME,
                GinkgoSuite::labelled("release-service", "release-service")
                    .with_pr_source(NAME, URL_VAR, REVISION_VAR),
            )
            .when(Condition::Paired)
            .labels(["release-service"])
            .with_description("a paired release-service PR is open from the same branch"),
        )
        .with_rule(preflight(NAME))
        .with_rule(
            Rule::new("release-pipelines-suite", CI, NAME, release_pipelines())
                .after(PREFLIGHT)
                .labels([RELEASE_PIPELINES_LABEL]),
        )
}
