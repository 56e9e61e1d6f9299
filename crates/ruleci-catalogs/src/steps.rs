//! Concrete CI steps shared by the catalogs.
//!
//! Each step reads its runtime knobs from the process environment when it
//! executes, never when the catalog is declared.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use ruleci_core::{run_command, Action, ActionError, CommandSpec, Context};

/// Label filter used when a full suite run is requested.
pub const DEFAULT_LABEL_FILTER: &str =
    "!upgrade-create && !upgrade-verify && !upgrade-cleanup && !release-pipelines";

/// Overrides [`DEFAULT_LABEL_FILTER`] for full suite runs.
pub const LABEL_FILTER_ENV: &str = "E2E_TEST_SUITE_LABEL";

/// Parallel ginkgo process count.
pub const GINKGO_PROCS_ENV: &str = "GINKGO_PROCS";

/// Prebuilt test binary; the `./cmd` package is compiled on the fly otherwise.
pub const E2E_BIN_PATH_ENV: &str = "E2E_BIN_PATH";

const GINKGO_TIMEOUT: &str = "90m";

/// Secrets every suite needs before it can talk to the cluster and registries.
pub const PREFLIGHT_ENV: &[&str] = &[
    "GITHUB_TOKEN",
    "QUAY_TOKEN",
    "DEFAULT_QUAY_ORG",
    "DEFAULT_QUAY_ORG_TOKEN",
];

/// Tools the suites shell out to.
pub const PREFLIGHT_BINARIES: &[&str] = &["git", "jq", "kubectl", "oc", "yq"];

/// Where a suite should fetch the code under test from, derived from the PR
/// recorded in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PrSource {
    repository: String,
    url_var: String,
    revision_var: String,
}

/// Label-filtered ginkgo run of the end-to-end suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GinkgoSuite {
    name: String,
    label_filter: Option<String>,
    env: Vec<(String, String)>,
    pr_source: Option<PrSource>,
}

impl GinkgoSuite {
    /// Run only the specs matching `label_filter`.
    pub fn labelled(name: impl Into<String>, label_filter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label_filter: Some(label_filter.into()),
            env: Vec::new(),
            pr_source: None,
        }
    }

    /// Run the full suite, honouring `E2E_TEST_SUITE_LABEL`.
    pub fn full(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label_filter: None,
            env: Vec::new(),
            pr_source: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Point the suite at the PR's fork of `repository` through `url_var` and
    /// `revision_var`.
    pub fn with_pr_source(
        mut self,
        repository: impl Into<String>,
        url_var: impl Into<String>,
        revision_var: impl Into<String>,
    ) -> Self {
        self.pr_source = Some(PrSource {
            repository: repository.into(),
            url_var: url_var.into(),
            revision_var: revision_var.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn resolve_label_filter(&self, lookup: &dyn Fn(&str) -> Option<String>) -> String {
        match &self.label_filter {
            Some(filter) => filter.clone(),
            None => lookup(LABEL_FILTER_ENV)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_LABEL_FILTER.to_string()),
        }
    }

    /// Full ginkgo argument vector for `ctx`, reading knobs through `lookup`.
    pub fn command(&self, ctx: &Context, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
        let output_dir = ctx
            .output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        let mut args = vec![
            "ginkgo".to_string(),
            "-p".to_string(),
            "--output-interceptor-mode=none".to_string(),
            "--no-color".to_string(),
            format!("--timeout={GINKGO_TIMEOUT}"),
            format!("--json-report=e2e-report-{}.json", self.name),
            format!("--output-dir={}", output_dir.display()),
            format!("--junit-report=e2e-report-{}.xml", self.name),
            format!("--label-filter={}", self.resolve_label_filter(lookup)),
        ];

        if let Some(procs) = lookup(GINKGO_PROCS_ENV).filter(|v| !v.is_empty()) {
            args.push(format!("--procs={procs}"));
        }

        args.push(
            lookup(E2E_BIN_PATH_ENV)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "./cmd".to_string()),
        );
        args.push("--".to_string());
        args
    }

    /// Extra environment for the suite process.
    pub fn environment(&self, ctx: &Context) -> Vec<(String, String)> {
        let mut env = self.env.clone();
        if let Some(src) = &self.pr_source {
            if !ctx.pr_owner.is_empty() {
                env.push((
                    src.url_var.clone(),
                    format!("https://github.com/{}/{}", ctx.pr_owner, src.repository),
                ));
                let revision = if ctx.pr_commit_sha.is_empty() {
                    ctx.pr_branch.clone()
                } else {
                    ctx.pr_commit_sha.clone()
                };
                env.push((src.revision_var.clone(), revision));
            }
        }
        env
    }
}

#[async_trait]
impl Action for GinkgoSuite {
    async fn execute(&self, ctx: &Context) -> Result<(), ActionError> {
        let lookup = |key: &str| env::var(key).ok();
        let mut spec = CommandSpec::new(&self.name, self.command(ctx, &lookup)).streaming();
        for (key, value) in self.environment(ctx) {
            spec = spec.with_env(key, value);
        }

        let output = run_command(&spec).await?.into_result()?;
        info!(suite = %self.name, duration_ms = output.duration_ms, "suite passed");
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.label_filter {
            Some(filter) => format!("ginkgo suite {} (label filter `{}`)", self.name, filter),
            None => format!("ginkgo suite {} (full)", self.name),
        }
    }
}

/// Preflight: every listed variable is set and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireEnv {
    vars: Vec<String>,
}

impl RequireEnv {
    pub fn new<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }

    pub fn missing(&self, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
        self.vars
            .iter()
            .filter(|v| lookup(v.as_str()).map_or(true, |val| val.is_empty()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Action for RequireEnv {
    async fn execute(&self, _ctx: &Context) -> Result<(), ActionError> {
        let missing = self.missing(&|key: &str| env::var(key).ok());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ActionError::MissingEnv(missing))
        }
    }

    fn describe(&self) -> String {
        format!("require env {}", self.vars.join(","))
    }
}

/// Preflight: every listed tool resolves on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireBinaries {
    binaries: Vec<String>,
}

impl RequireBinaries {
    pub fn new<I, S>(binaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binaries: binaries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn missing(&self, path_var: &OsStr) -> Vec<String> {
        self.binaries
            .iter()
            .filter(|b| find_on_path(b, path_var).is_none())
            .cloned()
            .collect()
    }
}

fn find_on_path(binary: &str, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_file(candidate))
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

#[async_trait]
impl Action for RequireBinaries {
    async fn execute(&self, _ctx: &Context) -> Result<(), ActionError> {
        let path_var = env::var_os("PATH").unwrap_or_default();
        let missing = self.missing(&path_var);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ActionError::MissingBinaries(missing))
        }
    }

    fn describe(&self) -> String {
        format!("require binaries {}", self.binaries.join(","))
    }
}

/// Log a line; used by the demo rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStep {
    message: String,
}

impl LogStep {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Action for LogStep {
    async fn execute(&self, ctx: &Context) -> Result<(), ActionError> {
        info!(
            repository = %ctx.repository_name,
            changed_files = ctx.changed_files().len(),
            "{}",
            self.message
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("log \"{}\"", self.message)
    }
}
