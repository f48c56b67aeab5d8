//! Plugin process execution.

use crate::error::{DiagError, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Result of executing a plugin process.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Whether the process succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: false,
        }
    }
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// A non-zero exit is reported through [`CommandResult::success`], not as an
/// error; only a failure to spawn is an error.
pub fn execute(program: &Path, args: &[&str]) -> Result<CommandResult> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = cmd.output().map_err(|e| DiagError::Execution {
        check: program.display().to_string(),
        message: format!("cannot start process: {}", e),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        Ok(CommandResult::success(stdout, stderr))
    } else {
        Ok(CommandResult::failure(output.status.code(), stdout, stderr))
    }
}

/// Run a plugin with a single flag and return its trimmed stdout.
///
/// Any non-zero exit is an error naming the flag.
pub fn query(program: &Path, flag: &str) -> Result<String> {
    let result = execute(program, &[flag])?;
    if !result.success {
        return Err(DiagError::Execution {
            check: program.display().to_string(),
            message: format!(
                "'{}' exited with code {:?}: {}",
                flag,
                result.exit_code,
                result.stderr.trim()
            ),
        });
    }
    Ok(result.stdout.trim().to_string())
}
