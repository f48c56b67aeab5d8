//! Outcome of one check run.

use serde_json::{json, Map, Value};

use crate::error::{DiagError, Result};
use crate::tree::{validate_root, Severity, RESULT_KEY, STATUS_KEY, VERBOSITY_KEY};

/// Message reported for a check that exceeded its timeout.
pub const TIMEOUT_MESSAGE: &str = "Timeout was exceeded.";
/// Message reported for a check that died without delivering a result.
pub const CRASH_MESSAGE: &str = "The check crashed before producing output.";

/// Severity plus the result entries a check produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    severity: Severity,
    entries: Map<String, Value>,
}

impl Summary {
    /// Build a summary from a `{"result": {...}}` document.
    ///
    /// The document is validated; the severity is derived from the tree.
    pub fn from_document(document: &Value) -> Result<Self> {
        let Some(fields) = document.as_object() else {
            return Err(DiagError::schema(
                "A summary must be a mapping with a top-level result.",
                document,
            ));
        };
        let Some(entries) = fields.get(RESULT_KEY).and_then(Value::as_object) else {
            return Err(DiagError::schema(
                "Top level should contain a result mapping.",
                document,
            ));
        };
        if entries.is_empty() {
            return Err(DiagError::schema(
                "The result mapping cannot be empty.",
                document,
            ));
        }

        Self::from_entries(entries.clone())
    }

    /// Parse and validate a summary document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text.trim())?;
        Self::from_document(&document)
    }

    /// Build a summary from already unwrapped top-level entries.
    pub fn from_entries(entries: Map<String, Value>) -> Result<Self> {
        let severity = validate_root(&entries)?;
        Ok(Self { severity, entries })
    }

    /// An ERROR summary for `check` with the given result and message.
    pub fn error(check: &str, result: &str, message: &str) -> Self {
        let node = json!({
            "status": "ERROR",
            "verbosity": 0,
            "message": message,
            "result": result,
        });
        let mut entries = Map::new();
        entries.insert(check.to_string(), node);
        Self {
            severity: Severity::Error,
            entries,
        }
    }

    /// The check exceeded its timeout and was killed.
    pub fn timed_out(check: &str) -> Self {
        Self::error(check, TIMEOUT_MESSAGE, TIMEOUT_MESSAGE)
    }

    /// The check exited without sending a result.
    pub fn crashed(check: &str) -> Self {
        Self::error(check, "", CRASH_MESSAGE)
    }

    /// The check reported its own failure.
    pub fn failed(check: &str, message: &str) -> Self {
        Self::error(check, "", message)
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Top-level entries produced by the check.
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// The node this summary occupies in the shared tree under its check's
    /// name: the worst status with the entries as children.
    pub fn to_node(&self) -> Value {
        let mut node = Map::new();
        node.insert(
            STATUS_KEY.to_string(),
            Value::from(self.severity.status().as_str()),
        );
        node.insert(VERBOSITY_KEY.to_string(), Value::from(0));
        node.insert(RESULT_KEY.to_string(), Value::Object(self.entries.clone()));
        Value::Object(node)
    }

    /// The wire form, `{"result": {...}}`.
    pub fn to_document(&self) -> Value {
        let mut document = Map::new();
        document.insert(RESULT_KEY.to_string(), Value::Object(self.entries.clone()));
        Value::Object(document)
    }
}
