//! Script-module checks.
//!
//! A module is registered with the host under a name and referenced from
//! disk by a `<name>.module` file. Loading asks the module for its API
//! version and check list, then resolves each check's `run` entry point into
//! a [`RunFn`] exactly once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Check, CheckKind, Metadata, MetadataDocument, Summary};
use crate::error::{DiagError, LoadErrorKind, Result};

/// File extension of module reference files.
pub const MODULE_EXTENSION: &str = "module";

/// A resolved check entry point.
pub type RunFn = Arc<dyn Fn(&Map<String, Value>) -> Result<Summary> + Send + Sync>;

/// The two functions a script module exposes, plus symbol lookup.
pub trait CheckModule: Send + Sync {
    /// API version the module was written against.
    fn api_version(&self) -> String;

    /// Metadata documents for every check the module provides.
    fn check_list(&self) -> Vec<MetadataDocument>;

    /// Look up an entry point by the name given in `run`.
    fn entry_point(&self, name: &str) -> Option<RunFn>;
}

/// A module assembled from metadata documents and functions.
#[derive(Clone)]
pub struct SimpleModule {
    api_version: String,
    checks: Vec<MetadataDocument>,
    entry_points: BTreeMap<String, RunFn>,
}

impl SimpleModule {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            checks: Vec::new(),
            entry_points: BTreeMap::new(),
        }
    }

    /// Add a check whose `run` field names `entry_point`.
    pub fn with_check<F>(mut self, doc: MetadataDocument, entry_point: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Summary> + Send + Sync + 'static,
    {
        self.entry_points
            .insert(doc.run.clone(), Arc::new(entry_point));
        self.checks.push(doc);
        self
    }
}

impl CheckModule for SimpleModule {
    fn api_version(&self) -> String {
        self.api_version.clone()
    }

    fn check_list(&self) -> Vec<MetadataDocument> {
        self.checks.clone()
    }

    fn entry_point(&self, name: &str) -> Option<RunFn> {
        self.entry_points.get(name).cloned()
    }
}

/// Modules known to the host, by name.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn CheckModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, module: impl CheckModule + 'static) {
        self.modules.insert(name.into(), Arc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CheckModule>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered module names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}

/// A check whose entry point lives in a registered module.
#[derive(Clone)]
pub struct ModuleCheck {
    module: String,
    run: RunFn,
}

impl ModuleCheck {
    pub fn new(module: impl Into<String>, run: RunFn) -> Self {
        Self {
            module: module.into(),
            run,
        }
    }

    pub fn run(&self, inputs: &Map<String, Value>) -> Result<Summary> {
        (self.run)(inputs)
    }
}

impl fmt::Debug for ModuleCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCheck")
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

/// Name of the module a reference file points at, if it is one.
///
/// Files whose stem starts with `_` are private and never loaded.
pub fn module_name(path: &Path) -> Option<&str> {
    if path.extension().and_then(|e| e.to_str()) != Some(MODULE_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|stem| !stem.is_empty() && !stem.starts_with('_'))
}

/// Load every check of the module referenced by `path`.
pub fn load_module_file(
    path: &Path,
    registry: &ModuleRegistry,
    expected_api: &str,
) -> Result<Vec<Check>> {
    let name = module_name(path).ok_or_else(|| DiagError::load(path, LoadErrorKind::UnsupportedFile))?;
    let module = registry.get(name).ok_or_else(|| {
        DiagError::load(
            path,
            LoadErrorKind::MalformedMetadata(format!("no module named '{}' is registered", name)),
        )
    })?;
    load_module(name, module.as_ref(), expected_api).map_err(|e| match e {
        DiagError::Load { kind, .. } => DiagError::load(path, kind),
        other => other,
    })
}

/// Load every check a registered module provides.
pub fn load_module(name: &str, module: &dyn CheckModule, expected_api: &str) -> Result<Vec<Check>> {
    let found = module.api_version();
    if found != expected_api {
        return Err(DiagError::load(
            name,
            LoadErrorKind::ApiVersionMismatch {
                expected: expected_api.to_string(),
                found,
            },
        ));
    }

    let mut checks = Vec::new();
    for doc in module.check_list() {
        let metadata = Metadata::from_document(doc, found.clone())?;
        let run = module.entry_point(metadata.entry_point()).ok_or_else(|| {
            DiagError::load(
                name,
                LoadErrorKind::MalformedMetadata(format!(
                    "entry point '{}' of check '{}' not found",
                    metadata.entry_point(),
                    metadata.name()
                )),
            )
        })?;
        checks.push(Check::new(metadata, CheckKind::Module(ModuleCheck::new(name, run))));
    }
    Ok(checks)
}
