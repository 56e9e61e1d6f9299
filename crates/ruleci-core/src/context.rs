//! Per-run input bundle handed to every condition and action.

use std::collections::HashSet;
use std::path::PathBuf;

/// Default JUnit report file name, relative to the output directory.
pub const DEFAULT_JUNIT_REPORT: &str = "e2e-report.xml";

/// Default JSON report file name, relative to the output directory.
pub const DEFAULT_JSON_REPORT: &str = "e2e-report.json";

/// Everything a rule's condition or action might need for one run.
///
/// Built by the caller before invoking the engine and discarded afterwards.
/// `is_paired` must already be computed: the engine never performs pairing
/// lookups itself.
#[derive(Debug, Clone)]
pub struct Context {
    /// Repository under test. Doubles as the catalog name for implicit runs.
    pub repository_name: String,

    changed_files: Vec<String>,

    pub job_name: String,
    pub job_type: String,

    pub pr_owner: String,
    pub pr_branch: String,
    pub pr_commit_sha: String,
    pub pr_number: u64,

    /// A companion repository has an open PR from the same owner and branch.
    pub is_paired: bool,

    /// Upstream trigger, e.g. `push` or `pull_request`.
    pub event_type: String,

    pub dry_run: bool,
    pub parallel: bool,

    /// Reports are written only when this is set.
    pub output_directory: Option<PathBuf>,
    pub junit_report_path: PathBuf,
    pub json_report_path: PathBuf,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            repository_name: String::new(),
            changed_files: Vec::new(),
            job_name: String::new(),
            job_type: String::new(),
            pr_owner: String::new(),
            pr_branch: String::new(),
            pr_commit_sha: String::new(),
            pr_number: 0,
            is_paired: false,
            event_type: String::new(),
            dry_run: false,
            parallel: false,
            output_directory: None,
            junit_report_path: PathBuf::from(DEFAULT_JUNIT_REPORT),
            json_report_path: PathBuf::from(DEFAULT_JSON_REPORT),
        }
    }
}

impl Context {
    /// Create a context for the given repository with default report names.
    pub fn new(repository_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            ..Self::default()
        }
    }

    /// Replace the changed-file list.
    ///
    /// Paths are normalised to repository-relative form (leading `./` and `/`
    /// stripped) and deduplicated, keeping the first occurrence's position.
    pub fn set_changed_files<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        self.changed_files = files
            .into_iter()
            .filter_map(|f| normalize_path(f.as_ref()))
            .filter(|f| seen.insert(f.clone()))
            .collect();
    }

    /// Builder form of [`Context::set_changed_files`].
    pub fn with_changed_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_changed_files(files);
        self
    }

    pub fn changed_files(&self) -> &[String] {
        &self.changed_files
    }

    /// Whether any changed file lives under `prefix`.
    pub fn any_changed_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_start_matches("./");
        self.changed_files.iter().any(|f| f.starts_with(prefix))
    }

    /// Periodic jobs and rehearsals carry no pull-request identity.
    pub fn is_periodic_or_rehearsal(&self) -> bool {
        self.job_type == "periodic" || self.job_name.contains("rehearse")
    }

    /// Full JUnit and JSON report paths, when an output directory is configured.
    pub fn report_paths(&self) -> Option<(PathBuf, PathBuf)> {
        self.output_directory.as_ref().map(|dir| {
            (
                dir.join(&self.junit_report_path),
                dir.join(&self.json_report_path),
            )
        })
    }
}

fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let mut path = trimmed;
    while let Some(rest) = path.strip_prefix("./") {
        path = rest;
    }
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_files_are_deduplicated_in_order() {
        let ctx = Context::new("e2e-tests").with_changed_files([
            "tests/release/foo.go",
            "./docs/readme.md",
            "tests/release/foo.go",
            "docs/readme.md",
            "",
        ]);
        assert_eq!(
            ctx.changed_files(),
            &["tests/release/foo.go".to_string(), "docs/readme.md".to_string()]
        );
    }

    #[test]
    fn any_changed_under_matches_prefix() {
        let ctx = Context::new("e2e-tests").with_changed_files(["tests/release/foo.go"]);
        assert!(ctx.any_changed_under("tests/release/"));
        assert!(ctx.any_changed_under("./tests/"));
        assert!(!ctx.any_changed_under("docs/"));
    }

    #[test]
    fn periodic_and_rehearsal_jobs_detected() {
        let mut ctx = Context::new("e2e-tests");
        ctx.job_type = "periodic".to_string();
        assert!(ctx.is_periodic_or_rehearsal());

        let mut ctx = Context::new("e2e-tests");
        ctx.job_type = "presubmit".to_string();
        ctx.job_name = "rehearse-123-pull-ci-e2e".to_string();
        assert!(ctx.is_periodic_or_rehearsal());

        ctx.job_name = "pull-ci-e2e".to_string();
        assert!(!ctx.is_periodic_or_rehearsal());
    }

    #[test]
    fn report_paths_require_output_directory() {
        let mut ctx = Context::new("e2e-tests");
        assert!(ctx.report_paths().is_none());

        ctx.output_directory = Some(PathBuf::from("/tmp/artifacts"));
        let (junit, json) = ctx.report_paths().unwrap();
        assert_eq!(junit, PathBuf::from("/tmp/artifacts/e2e-report.xml"));
        assert_eq!(json, PathBuf::from("/tmp/artifacts/e2e-report.json"));
    }
}
