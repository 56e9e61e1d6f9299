//! Source-control host lookups: PR head resolution and PR pairing.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Organization whose repositories are checked for paired PRs.
pub const PAIRING_ORG: &str = "redhat-appstudio";

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub head: Head,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Head {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

/// Whether any of `pulls` comes from `owner`'s `branch`.
pub fn find_pair(pulls: &[PullRequest], owner: &str, branch: &str) -> bool {
    pulls
        .iter()
        .any(|p| p.head.branch == branch && p.user.login == owner)
}

/// Thin REST client for the source-control host.
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ruleci/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "GET");
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("request to {url} was rejected"))?;

        response
            .json()
            .await
            .with_context(|| format!("unexpected response body from {url}"))
    }

    /// Fetch one pull request.
    pub async fn pull_request(&self, org: &str, repo: &str, number: u64) -> Result<PullRequest> {
        let url = format!("{}/repos/{org}/{repo}/pulls/{number}", self.api_url);
        self.get_json(&url).await
    }

    /// First page (up to 100) of open pull requests.
    pub async fn open_pull_requests(&self, org: &str, repo: &str) -> Result<Vec<PullRequest>> {
        let url = format!("{}/repos/{org}/{repo}/pulls?per_page=100", self.api_url);
        self.get_json(&url).await
    }

    /// Whether `companion` has an open PR from `owner`'s `branch`.
    ///
    /// Lookup failures are logged and treated as unpaired, so tests run
    /// against the companion's main branch.
    pub async fn is_paired(&self, companion: &str, owner: &str, branch: &str) -> bool {
        match self.open_pull_requests(PAIRING_ORG, companion).await {
            Ok(pulls) => find_pair(&pulls, owner, branch),
            Err(e) => {
                info!(
                    repository = %companion,
                    author = %owner,
                    error = %format!("{e:#}"),
                    "cannot determine paired PRs; using the main branch"
                );
                false
            }
        }
    }
}
