//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! - [`run`] - Run the checks and print the merged result tree
//! - [`list`] - List discovered checks
//! - [`sources`] - Check source and selection resolution shared by both

pub mod dispatcher;
pub mod list;
pub mod run;
pub mod sources;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
pub use sources::CheckSource;
