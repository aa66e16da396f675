//! Subprocess execution
//!
//! Blocking `Command` wrapper used for CMake, Conan and vcpkg invocations.
//! Output is either captured for diagnostics or inherited for interactive
//! tools; signals propagate to children through the shared process group.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Result of a subprocess execution
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,

    /// Process exit code (-1 when terminated by signal)
    pub exit_code: i32,

    /// Captured standard output (empty when IO is inherited)
    pub stdout: String,

    /// Captured standard error (empty when IO is inherited)
    pub stderr: String,

    /// Execution duration
    pub duration: Duration,
}

impl CommandResult {
    fn from_status(status: ExitStatus, stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            duration,
        }
    }
}

/// Invocation details for `run_command`
#[derive(Debug, Default)]
pub struct CommandSpec<'a> {
    /// Working directory, current dir if None
    pub cwd: Option<&'a Path>,
    /// Extra environment variables layered over the inherited environment
    pub env: HashMap<String, String>,
    /// Inherit stdin/stdout/stderr instead of capturing
    pub inherit_io: bool,
}

/// Run a command to completion
pub fn run_command(program: &str, args: &[String], spec: &CommandSpec<'_>) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(cwd) = spec.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    log::debug!("Running: {} {}", program, args.join(" "));

    if spec.inherit_io {
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd
            .status()
            .with_context(|| format!("Failed to execute {}", program))?;
        Ok(CommandResult::from_status(
            status,
            String::new(),
            String::new(),
            start.elapsed(),
        ))
    } else {
        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute {}", program))?;
        Ok(CommandResult::from_status(
            output.status,
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            start.elapsed(),
        ))
    }
}

/// Check if a command exists in PATH
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_output() {
        let result = run_command(
            "sh",
            &["-c".to_string(), "echo out; echo err 1>&2".to_string()],
            &CommandSpec::default(),
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[test]
    fn test_nonzero_exit() {
        let result = run_command(
            "sh",
            &["-c".to_string(), "exit 3".to_string()],
            &CommandSpec::default(),
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn test_env_and_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut env = HashMap::new();
        env.insert("TK_PROBE".to_string(), "42".to_string());

        let result = run_command(
            "sh",
            &["-c".to_string(), "echo $TK_PROBE; pwd".to_string()],
            &CommandSpec {
                cwd: Some(dir.path()),
                env,
                inherit_io: false,
            },
        )
        .unwrap();
        assert!(result.stdout.contains("42"));
        assert!(result
            .stdout
            .contains(dir.path().canonicalize().unwrap().to_str().unwrap()));
    }

    #[test]
    fn test_missing_program_is_error() {
        assert!(run_command("tk-definitely-not-a-command", &[], &CommandSpec::default()).is_err());
    }
}
