//! Command-line interface for diagrun.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations
//! - [`report`] - Saved report files

pub mod args;
pub mod commands;
pub mod report;

pub use args::Cli;
pub use commands::{Command, CommandDispatcher, CommandResult};
