//! Dependency extraction.
//!
//! A dependency document mirrors the shape of the result tree. Top-level
//! keys name producing checks:
//!
//! ```json
//! {"gpu_check": {"GPU": {"Intel": {}, "AMD": {}}}, "compiler_check": {}}
//! ```
//!
//! An empty (or non-object) shape takes the named node verbatim. A non-empty
//! shape descends into the node's `result` mapping and keeps only the listed
//! children.

use serde_json::{Map, Value};

use super::RESULT_KEY;

/// Extract the parts of `entries` described by `shape`.
///
/// Returns the detached subtree and the number of missing keys or type
/// mismatches encountered. A non-zero count means the check is not ready.
pub fn extract_subtree(
    entries: &Map<String, Value>,
    shape: &Map<String, Value>,
) -> (Map<String, Value>, usize) {
    let mut extracted = Map::new();
    let mut errors = 0;

    for (name, child_shape) in shape {
        let Some(node) = entries.get(name) else {
            errors += 1;
            continue;
        };

        match child_shape.as_object().filter(|s| !s.is_empty()) {
            None => {
                extracted.insert(name.clone(), node.clone());
            }
            Some(child_shape) => {
                let Some(children) = node.get(RESULT_KEY).and_then(Value::as_object) else {
                    errors += 1;
                    continue;
                };

                let (sub, sub_errors) = extract_subtree(children, child_shape);
                errors += sub_errors;

                let mut partial = node.as_object().cloned().unwrap_or_default();
                partial.insert(RESULT_KEY.to_string(), Value::Object(sub));
                extracted.insert(name.clone(), Value::Object(partial));
            }
        }
    }

    (extracted, errors)
}
