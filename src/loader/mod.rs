//! Plugin discovery.
//!
//! The [`Loader`] turns paths into [`Check`]s, dispatching on the file
//! signature:
//!
//! | File                          | Plugin kind  |
//! |-------------------------------|--------------|
//! | `*.so`, `*.dylib`, `*.dll`    | native library |
//! | `<module>.module`             | script module |
//! | `*.sh` or executable bit set  | executable   |
//!
//! A plugin that fails to load contributes zero checks and a warning; the
//! rest of the batch is unaffected.
//!
//! # Modules
//!
//! - [`config`] - JSON allow-list of plugin paths
//! - [`discovery`] - Collected checks and duplicate detection
//! - [`select`] - Tag and name selection

pub mod config;
pub mod discovery;
pub mod select;

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::check::executable::{load_executable, SCRIPT_EXTENSIONS};
use crate::check::library::{load_library, LIBRARY_EXTENSIONS};
use crate::check::module::{load_module, load_module_file, module_name, MODULE_EXTENSION};
use crate::check::{Check, ModuleRegistry};
use crate::error::{DiagError, LoadErrorKind, Result};
use crate::shell;

pub use config::ConfigEntry;
pub use discovery::Discovery;
pub use select::{select, Selection, ALL_SELECTION, DEFAULT_SELECTION};

/// API version this host speaks.
pub const HOST_API_VERSION: &str = "0.2";

/// Environment variable listing extra plugin locations.
pub const CHECKS_PATH_ENV: &str = "DIAGRUN_CHECKS_PATH";

/// Directory next to the binary searched when nothing else is given.
pub const DEFAULT_CHECKS_DIR: &str = "checks";

/// Kind of plugin a path holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Library,
    Executable,
    Module,
}

/// Decide which loader handles `path` without opening it.
pub fn classify(path: &Path) -> Option<PluginKind> {
    let extension = path.extension().and_then(OsStr::to_str).unwrap_or("");

    if LIBRARY_EXTENSIONS.contains(&extension) {
        return Some(PluginKind::Library);
    }
    if extension == MODULE_EXTENSION {
        return module_name(path).map(|_| PluginKind::Module);
    }
    if SCRIPT_EXTENSIONS.contains(&extension) || shell::is_executable(path) {
        return Some(PluginKind::Executable);
    }
    None
}

/// Loads checks from plugin files.
#[derive(Debug, Clone)]
pub struct Loader {
    api_version: String,
    modules: ModuleRegistry,
}

impl Loader {
    /// A loader for this host's API version.
    pub fn new(modules: ModuleRegistry) -> Self {
        Self::with_api_version(modules, HOST_API_VERSION)
    }

    pub fn with_api_version(modules: ModuleRegistry, api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            modules,
        }
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Load every check the plugin at `path` provides.
    pub fn load_path(&self, path: &Path) -> Result<Vec<Check>> {
        if !path.exists() {
            return Err(DiagError::load(path, LoadErrorKind::PathNotFound));
        }
        match classify(path) {
            Some(PluginKind::Library) => load_library(path, &self.api_version),
            Some(PluginKind::Module) => load_module_file(path, &self.modules, &self.api_version),
            Some(PluginKind::Executable) => load_executable(path, &self.api_version),
            None => Err(DiagError::load(path, LoadErrorKind::UnsupportedFile)),
        }
    }

    /// Load each path, warning about (and skipping) failures.
    pub fn discover(&self, paths: &[PathBuf]) -> Discovery {
        let mut discovery = Discovery::new();
        for path in paths {
            self.discover_into(&mut discovery, path);
        }
        discovery
    }

    /// Load every plugin found in the given locations.
    ///
    /// Directories are scanned one level deep in name order; files that are
    /// not plugins are skipped quietly.
    pub fn discover_locations(&self, locations: &[PathBuf]) -> Discovery {
        let mut discovery = Discovery::new();
        for location in locations {
            if !location.is_dir() {
                self.discover_into(&mut discovery, location);
                continue;
            }
            match plugin_files(location) {
                Ok(files) => {
                    for file in files {
                        self.discover_into(&mut discovery, &file);
                    }
                }
                Err(e) => warn!("Cannot read checks directory {}: {}", location.display(), e),
            }
        }
        discovery
    }

    /// Load the checks of every registered module.
    pub fn discover_registered(&self) -> Discovery {
        let mut discovery = Discovery::new();
        for name in self.modules.names() {
            let Some(module) = self.modules.get(name) else {
                continue;
            };
            let source = PathBuf::from(format!("{}.{}", name, MODULE_EXTENSION));
            match load_module(name, module.as_ref(), &self.api_version) {
                Ok(checks) => discovery.add(source, checks),
                Err(e) => {
                    warn!("{}", e);
                    discovery.record_failure(e);
                }
            }
        }
        discovery
    }

    /// Load exactly one plugin; no checks at all is a configuration error.
    pub fn load_single(&self, path: &Path) -> Result<Discovery> {
        let checks = self.load_path(path).map_err(|e| DiagError::Configuration {
            message: format!("cannot use checker {}: {}", path.display(), e),
        })?;
        if checks.is_empty() {
            return Err(DiagError::Configuration {
                message: format!("checker {} provides no checks", path.display()),
            });
        }
        let mut discovery = Discovery::new();
        discovery.add(path.to_path_buf(), checks);
        Ok(discovery)
    }

    /// Load the checks named by an allow-list file.
    ///
    /// Every entry must yield at least one check.
    pub fn load_config(&self, config_path: &Path) -> Result<Discovery> {
        let entries = config::load_entries(config_path)?;
        let mut discovery = Discovery::new();

        for entry in entries {
            let path = entry.resolve(config_path);
            let checks = match self.load_path(&path) {
                Ok(checks) => checks,
                Err(e) => {
                    warn!("{}", e);
                    Vec::new()
                }
            };
            let checks: Vec<Check> = checks
                .into_iter()
                .filter(|c| entry.name.as_deref().is_none_or(|n| n == c.name()))
                .collect();

            if checks.is_empty() {
                return Err(DiagError::Configuration {
                    message: format!("{} provides no checks", entry.describe()),
                });
            }
            discovery.add(path, checks);
        }
        Ok(discovery)
    }

    fn discover_into(&self, discovery: &mut Discovery, path: &Path) {
        match self.load_path(path) {
            Ok(checks) => {
                debug!("{} provides {} check(s)", path.display(), checks.len());
                discovery.add(path.to_path_buf(), checks);
            }
            Err(e) => {
                warn!("{}", e);
                discovery.record_failure(e);
            }
        }
    }
}

/// Split a search-path value into locations using the platform separator.
pub fn search_locations(value: &OsStr) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

/// The `checks` directory next to the running binary.
pub fn default_checks_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CHECKS_DIR)))
}

fn plugin_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            let keep = classify(path).is_some();
            if !keep {
                debug!("Skipping {}", path.display());
            }
            keep
        })
        .collect();
    files.sort();
    Ok(files)
}
