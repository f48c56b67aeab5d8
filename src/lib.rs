//! diagrun - Pluggable diagnostic check runner.
//!
//! diagrun discovers independently written checks (native libraries,
//! executables and script modules), runs them under their declared data
//! dependencies and per-check timeouts, and merges their results into one
//! validated JSON tree.
//!
//! # Modules
//!
//! - [`check`] - Check metadata, summaries and the three plugin kinds
//! - [`cli`] - Command-line interface and argument parsing
//! - [`error`] - Error types and result aliases
//! - [`loader`] - Plugin discovery, allow-lists and selection
//! - [`runner`] - Dependency scheduling and isolated execution
//! - [`shell`] - Process execution and platform probes
//! - [`tree`] - The shared result tree: merge, extraction and validation
//!
//! # Example
//!
//! ```
//! use diagrun::tree::{ResultTree, Severity};
//! use serde_json::json;
//!
//! let mut tree = ResultTree::new();
//! tree.merge_check(
//!     "gpu_check",
//!     json!({"status": "WARNING", "result": {
//!         "GPU": {"status": "WARNING", "result": "old driver"}
//!     }}),
//! );
//! assert!(tree.contains("gpu_check"));
//! assert_eq!(tree.validate().unwrap(), Severity::Warning);
//! ```

pub mod check;
pub mod cli;
pub mod error;
pub mod loader;
pub mod runner;
pub mod shell;
pub mod tree;

pub use error::{DiagError, Result};
