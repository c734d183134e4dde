//! Centralized command execution with consistent error handling.
//!
//! Every subprocess sourcery starts (git, make.bash, the Go driver, built
//! commands) goes through [`Cmd`]. Environments are explicit: a command
//! either inherits nothing beyond what the caller adds (`clear_env`) or the
//! caller's snapshot, never the ambient process environment by accident.

use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Exit status reported when a child did not exit normally.
pub const ABNORMAL_EXIT_STATUS: i32 = 1;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }

    /// Stderr if there is any, otherwise stdout. For error messages.
    pub fn diagnostic(&self) -> &str {
        if self.stderr_trimmed().is_empty() {
            self.stdout_trimmed()
        } else {
            self.stderr_trimmed()
        }
    }
}

/// How a child with inherited streams ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exited normally with this code.
    ExitCode(i32),
    /// Killed by this signal.
    Signaled(i32),
    /// Never started.
    LaunchFailed(String),
}

impl Outcome {
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Outcome::ExitCode(code),
            (None, Some(sig)) => Outcome::Signaled(sig),
            (None, None) => Outcome::LaunchFailed(format!("unknown exit status {:?}", status)),
        }
    }

    /// The status to exit with on behalf of the child.
    pub fn exit_status(&self) -> i32 {
        match self {
            Outcome::ExitCode(code) => *code,
            Outcome::Signaled(_) | Outcome::LaunchFailed(_) => ABNORMAL_EXIT_STATUS,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Outcome::ExitCode(0))
    }
}

/// Builder for configuring command execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    clear_env: bool,
    envs: Vec<(OsString, OsString)>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    /// Custom error message prefix.
    error_prefix: Option<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
            clear_env: false,
            envs: Vec::new(),
            allow_fail: false,
            error_prefix: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.as_os_str().to_os_string());
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Start from an empty environment.
    pub fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    /// Set one environment variable. Later settings win.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Set several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        for (k, v) in vars {
            self = self.env(k, v);
        }
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Program name for messages.
    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// One-line rendering for logs.
    pub fn describe(&self) -> String {
        let mut s = self.program();
        for a in &self.args {
            s.push(' ');
            s.push_str(&a.to_string_lossy());
        }
        if let Some(dir) = &self.current_dir {
            s.push_str(&format!(" (in {})", dir.display()));
        }
        s
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if self.clear_env {
            cmd.env_clear();
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn failure_prefix(&self) -> String {
        self.error_prefix
            .clone()
            .unwrap_or_else(|| format!("'{}' failed", self.program()))
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        tracing::debug!("run {}", self.describe());
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program()))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            let prefix = self.failure_prefix();
            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code());
            } else {
                bail!("{} (exit code {}):\n{}", prefix, result.code(), stderr);
            }
        }

        Ok(result)
    }

    /// Run the command with inherited stdio (interactive/streaming).
    ///
    /// Output goes directly to the terminal. Use for long-running commands
    /// where the user should see progress (e.g., the toolchain bootstrap).
    pub fn run_interactive(self) -> Result<ExitStatus> {
        tracing::debug!("run {}", self.describe());
        let status = self
            .command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program()))?;

        if !self.allow_fail && !status.success() {
            bail!(
                "{} (exit code {})",
                self.failure_prefix(),
                status.code().unwrap_or(-1)
            );
        }

        Ok(status)
    }

    /// Run with inherited stdio and report how the child ended. Never fails;
    /// a child that cannot be started is an [`Outcome::LaunchFailed`].
    pub fn outcome(self) -> Outcome {
        tracing::debug!("run {}", self.describe());
        match self
            .command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
        {
            Ok(status) => Outcome::from_status(status),
            Err(e) => Outcome::LaunchFailed(format!("{}: {}", self.program(), e)),
        }
    }
}

/// Check if a program exists in PATH.
///
/// Returns the full path if found, None otherwise.
pub fn which(program: &str) -> Option<String> {
    which::which(program)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn test_run_captures_stderr() {
        let result = Cmd::new("ls")
            .arg("/nonexistent_path_12345")
            .allow_fail()
            .run()
            .unwrap();

        assert!(!result.success());
        assert!(!result.stderr.is_empty());
        assert_eq!(result.diagnostic(), result.stderr_trimmed());
    }

    #[test]
    fn test_run_failure_includes_stderr() {
        let err = Cmd::new("ls")
            .arg("/nonexistent_path_12345")
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_clear_env_and_explicit_vars() {
        let result = Cmd::new("/bin/sh")
            .args(["-c", "echo \"${SOURCERY_PROBE:-unset}:${HOME:-nohome}\""])
            .clear_env()
            .env("SOURCERY_PROBE", "one")
            .env("SOURCERY_PROBE", "two")
            .run()
            .unwrap();
        assert_eq!(result.stdout_trimmed(), "two:nohome");
    }

    #[test]
    fn test_custom_error_message() {
        let err = Cmd::new("false")
            .error_msg("Custom build step failed")
            .run()
            .unwrap_err();

        assert!(err.to_string().contains("Custom build step failed"));
    }

    #[test]
    fn test_allow_fail() {
        let result = Cmd::new("false").allow_fail().run().unwrap();

        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn test_run_in_directory() {
        let result = Cmd::new("pwd").dir(Path::new("/tmp")).run().unwrap();
        assert!(result.stdout_trimmed().contains("tmp"));
    }

    #[test]
    fn test_outcome_exit_code() {
        let outcome = Cmd::new("/bin/sh").args(["-c", "exit 3"]).outcome();
        assert_eq!(outcome, Outcome::ExitCode(3));
        assert_eq!(outcome.exit_status(), 3);
    }

    #[test]
    fn test_outcome_signal() {
        let outcome = Cmd::new("/bin/sh").args(["-c", "kill -9 $$"]).outcome();
        assert_eq!(outcome, Outcome::Signaled(9));
        assert_eq!(outcome.exit_status(), ABNORMAL_EXIT_STATUS);
    }

    #[test]
    fn test_outcome_launch_failure() {
        let outcome = Cmd::new("/nonexistent_program_12345").outcome();
        assert!(matches!(outcome, Outcome::LaunchFailed(_)));
        assert_eq!(outcome.exit_status(), ABNORMAL_EXIT_STATUS);
    }

    #[test]
    fn test_describe() {
        let c = Cmd::new("git")
            .args(["clone", "--depth", "1"])
            .dir(Path::new("/tmp"));
        assert_eq!(c.describe(), "git clone --depth 1 (in /tmp)");
    }

    #[test]
    fn test_which() {
        assert!(which("sh").is_some());
        assert!(which("nonexistent_program_12345").is_none());
    }
}
