//! Allow-list configuration.
//!
//! ```json
//! [
//!   {"path": "checks/gpu.so", "name": "gpu_check"},
//!   {"path": "/opt/checks/exe_check.sh"}
//! ]
//! ```
//!
//! Relative paths are resolved against the configuration file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DiagError, Result};

/// One allowed plugin, optionally narrowed to a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConfigEntry {
    /// Path of the plugin, resolved against `config_path`'s directory.
    pub fn resolve(&self, config_path: &Path) -> PathBuf {
        if self.path.is_absolute() {
            return self.path.clone();
        }
        config_path
            .parent()
            .map(|dir| dir.join(&self.path))
            .unwrap_or_else(|| self.path.clone())
    }

    /// Human-readable form for error messages.
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("entry '{}' ({})", name, self.path.display()),
            None => format!("entry {}", self.path.display()),
        }
    }
}

/// Read and parse an allow-list file.
pub fn load_entries(config_path: &Path) -> Result<Vec<ConfigEntry>> {
    let content = fs::read_to_string(config_path).map_err(|e| DiagError::Configuration {
        message: format!("cannot read {}: {}", config_path.display(), e),
    })?;
    parse_entries(&content).map_err(|e| DiagError::Configuration {
        message: format!("{}: {}", config_path.display(), e),
    })
}

/// Parse allow-list JSON.
pub fn parse_entries(content: &str) -> std::result::Result<Vec<ConfigEntry>, serde_json::Error> {
    serde_json::from_str(content)
}
