//! CI job metadata carried in the `JOB_SPEC` environment variable.
//!
//! OpenShift CI (Prow) and Konflux CI publish different JSON shapes; both are
//! reduced to a [`PullRequestRef`].

use anyhow::{Context, Result};
use serde::Deserialize;

/// Prow job spec; only the fields the front end reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ProwJobSpec {
    pub refs: ProwRefs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProwRefs {
    #[serde(rename = "org")]
    pub organization: String,
    pub repo: String,
    #[serde(default)]
    pub pulls: Vec<ProwPull>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProwPull {
    pub number: u64,
    pub sha: String,
}

/// Konflux CI job spec.
#[derive(Debug, Clone, Deserialize)]
pub struct KonfluxJobSpec {
    #[serde(rename = "git")]
    pub git_refs: KonfluxGitRefs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KonfluxGitRefs {
    pub git_org: String,
    pub git_repo: String,
    pub commit_sha: String,
    #[serde(default)]
    pub pull_request_number: u64,
    #[serde(default)]
    pub event_type: String,
}

/// The change a CI job was triggered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub organization: String,
    pub repository: String,
    pub commit_sha: String,
    pub number: u64,
    /// Empty for Prow jobs, which are always pull-request triggered here.
    pub event_type: String,
}

impl PullRequestRef {
    pub fn is_push(&self) -> bool {
        self.event_type == "push"
    }
}

/// Parse `JOB_SPEC`, in Konflux format when `konflux` is set.
pub fn parse(raw: &str, konflux: bool) -> Result<PullRequestRef> {
    if konflux {
        let spec: KonfluxJobSpec =
            serde_json::from_str(raw).context("error when parsing konflux job spec data")?;
        let refs = spec.git_refs;
        return Ok(PullRequestRef {
            organization: refs.git_org,
            repository: refs.git_repo,
            commit_sha: refs.commit_sha,
            number: refs.pull_request_number,
            event_type: refs.event_type,
        });
    }

    let spec: ProwJobSpec =
        serde_json::from_str(raw).context("error when parsing openshift job spec data")?;
    let pull = spec
        .refs
        .pulls
        .first()
        .with_context(|| format!("job spec for {} lists no pull requests", spec.refs.repo))?;

    Ok(PullRequestRef {
        organization: spec.refs.organization.clone(),
        repository: spec.refs.repo.clone(),
        commit_sha: pull.sha.clone(),
        number: pull.number,
        event_type: String::new(),
    })
}
