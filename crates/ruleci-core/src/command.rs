//! External command steps.
//!
//! A [`CommandSpec`] describes one process invocation. The engine imposes no
//! timeout of its own; a step that needs one sets `timeout_secs`.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::ActionError;

/// Configuration for a single command step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Human-readable step name.
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Extra environment for the child process.
    pub env: Vec<(String, String)>,

    /// Timeout in seconds; 0 disables it.
    pub timeout_secs: u64,

    /// Capture stdout/stderr instead of streaming them to the job log.
    pub capture_output: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            env: Vec::new(),
            timeout_secs: 0,
            capture_output: true,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Let the child inherit stdout/stderr, as long-running test suites do.
    pub fn streaming(mut self) -> Self {
        self.capture_output = false;
        self
    }
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub name: String,

    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout, empty when streaming.
    pub stdout: String,

    /// Captured stderr, empty when streaming.
    pub stderr: String,

    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Convert a non-zero exit into an [`ActionError`].
    pub fn into_result(self) -> Result<Self, ActionError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(ActionError::NonZeroExit {
                step: self.name,
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Execute a command step and return its output.
///
/// Spawn failures and timeouts are errors; a non-zero exit is reported in
/// [`CommandOutput::exit_code`].
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput, ActionError> {
    let start = Instant::now();

    let Some((exe, args)) = spec.command.split_first() else {
        return Err(ActionError::Failed(format!(
            "step {} has an empty command",
            spec.name
        )));
    };

    debug!(step = %spec.name, command = ?spec.command, "spawning step");

    let (stdout, stderr) = if spec.capture_output {
        (Stdio::piped(), Stdio::piped())
    } else {
        (Stdio::inherit(), Stdio::inherit())
    };

    let child = Command::new(exe)
        .args(args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ActionError::Spawn {
            program: exe.clone(),
            source,
        })?;

    let waited = if spec.timeout_secs > 0 {
        tokio::time::timeout(
            Duration::from_secs(spec.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ActionError::Timeout {
            step: spec.name.clone(),
            timeout_secs: spec.timeout_secs,
        })?
    } else {
        child.wait_with_output().await
    };
    let output = waited.map_err(|source| ActionError::Spawn {
        program: exe.clone(),
        source,
    })?;

    Ok(CommandOutput {
        name: spec.name.clone(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}
