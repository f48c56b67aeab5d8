//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing the parsed CLI to a command

use std::io::Write;

use crate::cli::args::Cli;
use crate::error::Result;
use crate::loader::Loader;

use super::list::ListCommand;
use super::run::RunCommand;

/// Trait for command implementations.
pub trait Command {
    /// Execute the command, writing its primary output to `out`.
    ///
    /// Logs go through `tracing`; only data a caller may pipe elsewhere is
    /// written to `out`.
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches the parsed CLI to a command implementation.
pub struct CommandDispatcher {
    loader: Loader,
}

impl CommandDispatcher {
    /// Create a dispatcher that loads checks with `loader`.
    pub fn new(loader: Loader) -> Self {
        Self { loader }
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, out: &mut dyn Write) -> Result<CommandResult> {
        if cli.list {
            ListCommand::from_cli(self.loader.clone(), cli).execute(out)
        } else {
            RunCommand::from_cli(self.loader.clone(), cli).execute(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::builtin;
    use clap::Parser;

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(Loader::new(builtin::registry(crate::loader::HOST_API_VERSION)))
    }

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn list_flag_lists_builtin_checks() {
        let cli = Cli::try_parse_from(["diagrun", "--list", "--checks-path", ""]).unwrap();
        let mut out = Vec::new();

        let result = dispatcher().dispatch(&cli, &mut out).unwrap();
        assert!(result.success);
        assert!(String::from_utf8(out).unwrap().contains("host_check"));
    }

    #[test]
    fn default_run_prints_result_document() {
        let cli = Cli::try_parse_from([
            "diagrun",
            "--isolation",
            "none",
            "--checks-path",
            "",
        ])
        .unwrap();
        let mut out = Vec::new();

        dispatcher().dispatch(&cli, &mut out).unwrap();
        let document: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(document["result"]["host_check"]["result"]["Host"].is_object());
    }
}
