//! Error types for diagrun operations.
//!
//! This module defines [`DiagError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Load failures ([`DiagError::Load`], [`DiagError::InvalidMetadata`]) are
//!   recoverable: the plugin contributes zero checks and discovery continues
//! - Configuration and scheduling failures end the process with exit code 1
//! - Execution and schema failures of a single check are folded into an
//!   ERROR entry of the result tree by the runner

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a plugin path contributed no checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadErrorKind {
    /// The path does not exist.
    PathNotFound,

    /// Script or executable without the execute bit.
    NotExecutable,

    /// The plugin speaks another API version than the host.
    ApiVersionMismatch { expected: String, found: String },

    /// The plugin produced metadata that could not be decoded.
    MalformedMetadata(String),

    /// The file type is not a known plugin type.
    UnsupportedFile,

    /// The dynamic loader rejected the library or a symbol is missing.
    Library(String),
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadErrorKind::PathNotFound => write!(f, "path does not exist"),
            LoadErrorKind::NotExecutable => write!(f, "file is not executable"),
            LoadErrorKind::ApiVersionMismatch { expected, found } => write!(
                f,
                "API version mismatch (host expects {}, plugin declares {})",
                expected, found
            ),
            LoadErrorKind::MalformedMetadata(message) => {
                write!(f, "malformed metadata: {}", message)
            }
            LoadErrorKind::UnsupportedFile => write!(f, "not a loadable check file"),
            LoadErrorKind::Library(message) => write!(f, "{}", message),
        }
    }
}

/// Core error type for diagrun operations.
#[derive(Debug, Error)]
pub enum DiagError {
    /// Metadata failed validation while constructing a check.
    #[error("Invalid metadata for '{name}': {message}")]
    InvalidMetadata { name: String, message: String },

    /// A plugin path could not be loaded.
    #[error("Failed to load {path}: {kind}")]
    Load { path: PathBuf, kind: LoadErrorKind },

    /// Operator-level misconfiguration (allow-list, empty check set).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Two plugins contribute a check with the same name.
    #[error("Duplicate check name '{name}' provided by {first} and {second}")]
    DuplicateCheck {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A scheduling round made no progress.
    #[error("Unsatisfiable dependencies, checks cannot run: {}", .stuck.join(", "))]
    Scheduling { stuck: Vec<String> },

    /// A check failed while running.
    #[error("Check '{check}' failed: {message}")]
    Execution { check: String, message: String },

    /// A result tree violates the node schema.
    #[error("Error in subtree: {subtree}. {message}")]
    Schema { message: String, subtree: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DiagError {
    /// Create a load error for a path.
    pub fn load(path: impl Into<PathBuf>, kind: LoadErrorKind) -> Self {
        DiagError::Load {
            path: path.into(),
            kind,
        }
    }

    /// Create a schema error carrying the offending subtree.
    pub fn schema(message: impl Into<String>, subtree: &serde_json::Value) -> Self {
        DiagError::Schema {
            message: message.into(),
            subtree: subtree.to_string(),
        }
    }

    /// Whether this error must stop the process before any check runs.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagError::Configuration { .. }
                | DiagError::DuplicateCheck { .. }
                | DiagError::Scheduling { .. }
        )
    }
}

/// Result type alias for diagrun operations.
pub type Result<T> = std::result::Result<T, DiagError>;
