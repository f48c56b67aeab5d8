//! Result tree schema validation.
//!
//! Every node must carry a `status` (one of PASS, WARNING, FAIL, ERROR,
//! INFO) and a `result`. A mapping `result` is validated recursively. The
//! optional `verbosity` must be a non-negative integer and is pinned to 0
//! for the entries directly under the root. The validator returns the worst
//! severity found anywhere in the tree.

use serde_json::{Map, Value};

use super::{Severity, Status, RESULT_KEY, STATUS_KEY, TEXT_KEYS, VERBOSITY_KEY};
use crate::error::{DiagError, Result};

/// Validate the top-level entries of a tree.
pub fn validate_root(entries: &Map<String, Value>) -> Result<Severity> {
    validate_children(entries, true)
}

fn validate_children(children: &Map<String, Value>, is_root: bool) -> Result<Severity> {
    let mut worst = Severity::Pass;
    for node in children.values() {
        worst = worst.max(validate_entry(node, is_root)?);
    }
    Ok(worst)
}

fn validate_entry(node: &Value, is_root: bool) -> Result<Severity> {
    let Some(fields) = node.as_object() else {
        return Err(DiagError::schema("A node must be a mapping.", node));
    };

    let status = match fields.get(STATUS_KEY) {
        None => return Err(DiagError::schema("status is required.", node)),
        Some(value) => value.as_str().and_then(Status::parse).ok_or_else(|| {
            DiagError::schema(
                "status value can be only PASS, WARNING, FAIL, ERROR, INFO.",
                node,
            )
        })?,
    };

    if let Some(verbosity) = fields.get(VERBOSITY_KEY) {
        let Some(level) = verbosity.as_u64() else {
            return Err(DiagError::schema(
                "verbosity must be a non-negative integer.",
                node,
            ));
        };
        if is_root && level != 0 {
            return Err(DiagError::schema(
                "Root verbosity level must be set to zero.",
                node,
            ));
        }
    }

    for key in TEXT_KEYS {
        if let Some(value) = fields.get(key) {
            if !value.is_string() {
                return Err(DiagError::schema(format!("{} must be a string.", key), node));
            }
        }
    }

    let mut severity = status.severity();
    match fields.get(RESULT_KEY) {
        None => return Err(DiagError::schema("result is required.", node)),
        Some(Value::Object(children)) => {
            severity = severity.max(validate_children(children, false)?);
        }
        Some(Value::Array(_)) => {
            return Err(DiagError::schema(
                "result must be a terminal value or a mapping.",
                node,
            ))
        }
        Some(_) => {}
    }

    Ok(severity)
}
