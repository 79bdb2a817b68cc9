//! Subprocess execution under a timeout.
//!
//! A timed-out child is killed and reported through
//! [`CommandOutput::timed_out`]; callers treat a timeout the same as a
//! failed command.

use camino::Utf8Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported when the process produced none (signal or timeout).
pub const NO_EXIT_CODE: i32 = -1;

/// Captured output of a finished or timed-out subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit code, or [`NO_EXIT_CODE`].
    pub exit_code: i32,
    /// Whether the timeout elapsed before the process exited.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Returns `true` when the process exited with status zero in time.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Returns trimmed standard output.
    #[must_use]
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Returns a one-line description of a failure for logs and audit
    /// messages.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        if self.timed_out {
            return "timed out".to_owned();
        }
        let detail = self
            .stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .or_else(|| self.stdout.lines().map(str::trim).find(|line| !line.is_empty()))
            .unwrap_or("no output");
        format!("exit code {}: {detail}", self.exit_code)
    }
}

/// Errors raised when a subprocess cannot be run at all.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Waiting for the program failed.
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Runs `program` with `args` in `cwd`, killing it after `timeout`.
///
/// # Errors
///
/// Returns [`ProcessError`] when the process cannot be spawned or awaited.
/// A non-zero exit or a timeout is reported in the returned
/// [`CommandOutput`] instead.
pub async fn run_command(
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    cwd: &Utf8Path,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    let mut command = Command::new(program);
    command.args(args).envs(envs.iter().copied());
    run(program, command, cwd, timeout).await
}

/// Runs `script` through `sh -c` in `cwd`, killing it after `timeout`.
///
/// # Errors
///
/// See [`run_command`].
pub async fn run_shell(
    script: &str,
    cwd: &Utf8Path,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    run(script, command, cwd, timeout).await
}

async fn run(
    label: &str,
    mut command: Command,
    cwd: &Utf8Path,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    debug!(command = label, cwd = %cwd, ?timeout, "spawning subprocess");
    let child = command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: label.to_owned(),
            source,
        })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let result = CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(NO_EXIT_CODE),
                timed_out: false,
            };
            debug!(
                command = label,
                exit_code = result.exit_code,
                stdout_len = result.stdout.len(),
                "subprocess completed"
            );
            Ok(result)
        }
        Ok(Err(source)) => Err(ProcessError::Wait {
            program: label.to_owned(),
            source,
        }),
        Err(_) => {
            warn!(command = label, ?timeout, "subprocess timed out");
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: format!("process timed out after {timeout:?}"),
                exit_code: NO_EXIT_CODE,
                timed_out: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    //! Tests for subprocess execution.

    use super::{CommandOutput, NO_EXIT_CODE, run_command, run_shell};
    use camino::Utf8PathBuf;
    use eyre::{Result, ensure};
    use std::time::Duration;

    fn temp_dir() -> Result<Utf8PathBuf> {
        Ok(Utf8PathBuf::try_from(std::env::temp_dir())?)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn captures_output_and_exit_code() -> Result<()> {
        let script = "echo hello; echo oops >&2; exit 3";
        let output = run_shell(script, &temp_dir()?, Duration::from_secs(10)).await?;
        ensure!(output.stdout_trimmed() == "hello");
        ensure!(output.exit_code == 3);
        ensure!(!output.success());
        ensure!(output.failure_summary() == "exit code 3: oops");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timeout_is_reported_not_raised() -> Result<()> {
        let output =
            run_command("sleep", &["5"], &[], &temp_dir()?, Duration::from_millis(100)).await?;
        ensure!(output.timed_out);
        ensure!(output.exit_code == NO_EXIT_CODE);
        ensure!(output.failure_summary() == "timed out");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_program_is_a_spawn_error() -> Result<()> {
        let result = run_command(
            "atelier-definitely-missing-binary",
            &[],
            &[],
            &temp_dir()?,
            Duration::from_secs(1),
        )
        .await;
        ensure!(result.is_err());
        Ok(())
    }

    #[test]
    fn success_requires_zero_exit_in_time() {
        let output = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            timed_out: false,
        };
        assert!(output.success());
    }
}
