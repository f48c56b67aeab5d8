//! Executable checks.
//!
//! An executable is queried with fixed flags: `--get_api_version` and
//! `--get_metadata` once at load time, `--get_summary` for each run. Each
//! executable provides exactly one check and cannot receive inputs.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::{Check, CheckKind, Metadata, MetadataDocument, Summary};
use crate::error::{DiagError, LoadErrorKind, Result};
use crate::shell;

pub const API_VERSION_FLAG: &str = "--get_api_version";
pub const METADATA_FLAG: &str = "--get_metadata";
pub const SUMMARY_FLAG: &str = "--get_summary";

/// Script extensions run as executables.
pub const SCRIPT_EXTENSIONS: [&str; 1] = ["sh"];

/// A check implemented by a standalone program.
#[derive(Debug, Clone)]
pub struct ExecutableCheck {
    path: PathBuf,
}

impl ExecutableCheck {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Invoke `--get_summary` and parse what the program prints.
    pub fn run(&self, check: &str, inputs: &Map<String, Value>) -> Result<Summary> {
        if !inputs.is_empty() {
            return Err(DiagError::Execution {
                check: check.to_string(),
                message: "Passing data to executable checks is not implemented.".to_string(),
            });
        }
        let output = shell::query(&self.path, SUMMARY_FLAG)?;
        Summary::from_json(&output)
    }
}

/// Load the single check an executable provides.
pub fn load_executable(path: &Path, expected_api: &str) -> Result<Vec<Check>> {
    if !shell::is_executable(path) {
        return Err(DiagError::load(path, LoadErrorKind::NotExecutable));
    }

    let malformed = |e: DiagError| DiagError::load(path, LoadErrorKind::MalformedMetadata(e.to_string()));

    let found = shell::query(path, API_VERSION_FLAG).map_err(malformed)?;
    if found != expected_api {
        return Err(DiagError::load(
            path,
            LoadErrorKind::ApiVersionMismatch {
                expected: expected_api.to_string(),
                found,
            },
        ));
    }

    let raw = shell::query(path, METADATA_FLAG).map_err(malformed)?;
    let mut doc = MetadataDocument::from_json(&raw).map_err(malformed)?;
    if doc.run.is_empty() {
        doc.run = path.display().to_string();
    }
    let metadata = Metadata::from_document(doc, found)?;
    debug!("Loaded executable check '{}' from {}", metadata.name(), path.display());

    Ok(vec![Check::new(
        metadata,
        CheckKind::Executable(ExecutableCheck {
            path: path.to_path_buf(),
        }),
    )])
}
