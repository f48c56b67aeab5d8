//! Process execution and platform probes.

pub mod command;
pub mod platform;

pub use command::{execute, query, CommandResult};
pub use platform::{
    hostname, is_elevated, is_executable, shared_memory_usable, SHARED_MEMORY_DIR,
};
