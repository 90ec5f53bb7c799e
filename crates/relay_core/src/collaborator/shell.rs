use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `-1` if the process was killed by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns true for exit code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell command lines.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Runs `command` through the platform shell with `dir` as the working
    /// directory and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Command`] if the process cannot be started.
    async fn run(&self, command: &str, dir: &Path) -> CoreResult<CommandOutput>;
}

/// Runs commands with `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

#[async_trait]
impl ShellExecutor for SystemShell {
    async fn run(&self, command: &str, dir: &Path) -> CoreResult<CommandOutput> {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        cmd.arg(command).current_dir(dir).kill_on_drop(true);

        debug!(command, dir = %dir.display(), "running command");
        let output = cmd.output().await.map_err(|source| CoreError::Command {
            command: command.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs the configured check (lint) command and counts its errors.
#[async_trait]
pub trait CheckRunner: Send + Sync {
    /// Returns the number of errors reported by `command` in `dir`.
    ///
    /// An empty command means no check is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the check could not be run at all.
    async fn error_count(&self, command: &str, dir: &Path) -> CoreResult<u32>;
}

/// Counts errors from a command's exit status and output.
///
/// Exit code zero means no errors. Otherwise every output line mentioning
/// `error` counts, with a minimum of one.
pub struct ShellCheckRunner<S = SystemShell> {
    shell: S,
}

impl ShellCheckRunner<SystemShell> {
    /// Creates a runner over the system shell.
    #[must_use]
    pub fn new() -> Self {
        Self { shell: SystemShell }
    }
}

impl Default for ShellCheckRunner<SystemShell> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ShellExecutor> ShellCheckRunner<S> {
    /// Creates a runner over a custom shell.
    pub fn with_shell(shell: S) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl<S: ShellExecutor> CheckRunner for ShellCheckRunner<S> {
    async fn error_count(&self, command: &str, dir: &Path) -> CoreResult<u32> {
        if command.trim().is_empty() {
            return Ok(0);
        }
        let output = self.shell.run(command, dir).await?;
        if output.success() {
            return Ok(0);
        }

        let count = count_error_lines(&output.stdout) + count_error_lines(&output.stderr);
        warn!(command, exit_code = output.exit_code, errors = count.max(1), "check reported errors");
        Ok(count.max(1))
    }
}

fn count_error_lines(output: &str) -> u32 {
    let count = output
        .lines()
        .filter(|line| line.to_ascii_lowercase().contains("error"))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
