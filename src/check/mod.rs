//! Checks and their three execution models.
//!
//! A [`Check`] couples validated [`Metadata`] with the plugin that runs it:
//!
//! - [`library`] - Native shared objects with a C ABI
//! - [`executable`] - Standalone programs queried through fixed flags
//! - [`module`] - Script modules registered with the host
//!
//! [`builtin`] holds the modules shipped with the binary.

pub mod builtin;
pub mod executable;
pub mod library;
pub mod metadata;
pub mod module;
pub mod summary;

use serde_json::{Map, Value};

use crate::error::Result;

pub use executable::ExecutableCheck;
pub use library::LibraryCheck;
pub use metadata::{Metadata, MetadataDocument, Privilege};
pub use module::{CheckModule, ModuleCheck, ModuleRegistry, RunFn, SimpleModule};
pub use summary::Summary;

/// How a check is executed.
#[derive(Debug)]
pub enum CheckKind {
    Library(LibraryCheck),
    Executable(ExecutableCheck),
    Module(ModuleCheck),
}

impl CheckKind {
    /// Short label used in listings and logs.
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Library(_) => "library",
            CheckKind::Executable(_) => "executable",
            CheckKind::Module(_) => "module",
        }
    }
}

/// One unit of diagnostic work.
///
/// Created by the loader and run at most once by the runner, which caches
/// the resulting [`Summary`] here.
#[derive(Debug)]
pub struct Check {
    metadata: Metadata,
    kind: CheckKind,
    summary: Option<Summary>,
}

impl Check {
    pub fn new(metadata: Metadata, kind: CheckKind) -> Self {
        Self {
            metadata,
            kind,
            summary: None,
        }
    }

    /// A check backed by a plain function, outside any plugin file.
    pub fn from_fn<F>(metadata: Metadata, run: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Summary> + Send + Sync + 'static,
    {
        let module = ModuleCheck::new("inline", std::sync::Arc::new(run));
        Self::new(metadata, CheckKind::Module(module))
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn api_version(&self) -> &str {
        self.metadata.api_version()
    }

    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    /// Run the check in the current process with the extracted `inputs`.
    pub fn run(&self, inputs: &Map<String, Value>) -> Result<Summary> {
        match &self.kind {
            CheckKind::Library(check) => check.run(self.name(), inputs),
            CheckKind::Executable(check) => check.run(self.name(), inputs),
            CheckKind::Module(check) => check.run(inputs),
        }
    }

    /// The cached summary of a completed run.
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn set_summary(&mut self, summary: Summary) {
        self.summary = Some(summary);
    }
}
