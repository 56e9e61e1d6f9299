//! Changed-file lookup for the checked-out repository.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Base the PR branch is compared against.
pub const DEFAULT_BASE_REF: &str = "origin/main";

/// Files changed between the merge base of `base_ref` and `HEAD`, in the
/// order git reports them.
pub async fn changed_files(repo_dir: &Path, base_ref: &str) -> Result<Vec<String>> {
    let range = format!("{base_ref}...HEAD");
    let output = Command::new("git")
        .args(["diff", "--name-only", &range])
        .current_dir(repo_dir)
        .output()
        .await
        .context("failed to run git")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git diff --name-only {range} failed: {}", stderr.trim());
    }

    let files: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    debug!(base = %base_ref, count = files.len(), "changed files resolved");
    Ok(files)
}
