//! Result tree shared by all checks.
//!
//! Every check produces a tree of nodes shaped like
//!
//! ```json
//! {"status": "PASS", "result": {"driver": {"status": "INFO", "result": "1.3"}}}
//! ```
//!
//! The runner merges each check's summary into one [`ResultTree`] keyed by
//! check name at the top level:
//!
//! ```json
//! {"gpu_check": {"status": "PASS", "verbosity": 0, "result": {"GPU": {...}}}}
//! ```
//!
//! # Modules
//!
//! - [`extract`] - Pulling declared dependency subtrees out of the shared tree
//! - [`merge`] - Recursive last-write-wins merge
//! - [`validate`] - Node schema validation and severity derivation

pub mod extract;
pub mod merge;
pub mod validate;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

pub use extract::extract_subtree;
pub use validate::validate_root;

/// Key of the status field of a node.
pub const STATUS_KEY: &str = "status";
/// Key of the result field of a node.
pub const RESULT_KEY: &str = "result";
/// Key of the optional verbosity field of a node.
pub const VERBOSITY_KEY: &str = "verbosity";
/// Optional node fields that must hold text when present.
pub const TEXT_KEYS: [&str; 4] = ["message", "command", "howToFix", "automationFix"];

/// Status a check reports for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Warning,
    Fail,
    Error,
    Info,
}

impl Status {
    /// Parse a status as written in a result tree.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(Status::Pass),
            "WARNING" => Some(Status::Warning),
            "FAIL" => Some(Status::Fail),
            "ERROR" => Some(Status::Error),
            "INFO" => Some(Status::Info),
            _ => None,
        }
    }

    /// The wire spelling of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Warning => "WARNING",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
            Status::Info => "INFO",
        }
    }

    /// Severity contributed by a node with this status.
    pub fn severity(&self) -> Severity {
        match self {
            Status::Pass | Status::Info => Severity::Pass,
            Status::Warning => Severity::Warning,
            Status::Fail => Severity::Fail,
            Status::Error => Severity::Error,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worst status found in a tree, ordered from best to worst.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    #[default]
    Pass = 0,
    Warning = 1,
    Fail = 2,
    Error = 3,
}

impl Severity {
    /// Numeric code (0 = PASS .. 3 = ERROR).
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// The status a node with this severity reports.
    pub fn status(&self) -> Status {
        match self {
            Severity::Pass => Status::Pass,
            Severity::Warning => Status::Warning,
            Severity::Fail => Status::Fail,
            Severity::Error => Status::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Pass => "PASS",
            Severity::Warning => "WARNING",
            Severity::Fail => "FAIL",
            Severity::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// The tree every completed check is merged into.
///
/// Only the runner mutates it; checks receive detached copies produced by
/// [`ResultTree::extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTree {
    entries: Map<String, Value>,
}

impl ResultTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing top-level entries.
    pub fn from_entries(entries: Map<String, Value>) -> Self {
        Self { entries }
    }

    /// Top-level entries, in insertion order.
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Look up a top-level entry.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Whether a check named `name` has been merged.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Merge top-level entries into this tree (last write wins).
    pub fn merge(&mut self, entries: &Map<String, Value>) {
        merge::merge_into(&mut self.entries, entries);
    }

    /// Merge a check's node under the check's name.
    pub fn merge_check(&mut self, check: &str, node: Value) {
        let mut entries = Map::new();
        entries.insert(check.to_string(), node);
        self.merge(&entries);
    }

    /// Copy out the subtree a dependency document asks for.
    ///
    /// Returns the detached inputs and the number of paths that could not be
    /// satisfied.
    pub fn extract(&self, dependencies: &Map<String, Value>) -> (Map<String, Value>, usize) {
        extract_subtree(&self.entries, dependencies)
    }

    /// Validate the whole tree as a root and return its severity.
    pub fn validate(&self) -> Result<Severity> {
        validate_root(&self.entries)
    }

    /// The tree as a summary document, `{"result": {...}}`.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(RESULT_KEY.to_string(), Value::Object(self.entries.clone()));
        Value::Object(doc)
    }

    pub fn into_entries(self) -> Map<String, Value> {
        self.entries
    }
}
