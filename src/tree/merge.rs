//! Deep merge of result trees.
//!
//! # Merge Rules
//!
//! - Objects are merged recursively
//! - Anything else in the source overwrites the destination
//! - Overwrites are allowed and only noted at debug level

use serde_json::{Map, Value};
use tracing::debug;

/// Merge `src` into `dst` in place.
pub fn merge_into(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, src_value) in src {
        let Some(existing) = dst.get_mut(key) else {
            dst.insert(key.clone(), src_value.clone());
            continue;
        };

        match (existing, src_value) {
            (Value::Object(dst_map), Value::Object(src_map)) => merge_into(dst_map, src_map),
            (existing, _) => {
                debug!("Overwriting result entry '{}': {} -> {}", key, existing, src_value);
                *existing = src_value.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deep_merge(base: &Value, overlay: &Value) -> Value {
        let mut result = base.as_object().cloned().unwrap_or_default();
        if let Some(overlay) = overlay.as_object() {
            merge_into(&mut result, overlay);
        }
        Value::Object(result)
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let base = json!({
            "GPU": {"status": "PASS", "result": {"Intel": {"status": "PASS", "result": "ok"}}}
        });
        let overlay = json!({
            "GPU": {"result": {"AMD": {"status": "FAIL", "result": "missing"}}}
        });

        let result = deep_merge(&base, &overlay);

        assert_eq!(result["GPU"]["status"], "PASS");
        assert_eq!(result["GPU"]["result"]["Intel"]["result"], "ok");
        assert_eq!(result["GPU"]["result"]["AMD"]["status"], "FAIL");
    }

    #[test]
    fn scalar_overlay_replaces_mapping_base() {
        let base = json!({"a": {"status": "PASS", "result": {"x": 1}}});
        let overlay = json!({"a": {"result": "flat"}});

        let result = deep_merge(&base, &overlay);
        assert_eq!(result["a"]["result"], "flat");
        assert_eq!(result["a"]["status"], "PASS");
    }

    #[test]
    fn mapping_overlay_replaces_scalar_base() {
        let base = json!({"a": 1});
        let overlay = json!({"a": {"b": 2}});

        let result = deep_merge(&base, &overlay);
        assert_eq!(result["a"]["b"], 2);
    }

    #[test]
    fn empty_overlay_returns_base_unchanged() {
        let base = json!({"a": {"status": "WARNING", "result": "x"}});
        let result = deep_merge(&base, &json!({}));
        assert_eq!(result, base);
    }

    #[test]
    fn disjoint_merge_is_a_union_in_either_order() {
        let a = json!({"a": {"status": "PASS", "result": 1}});
        let b = json!({"b": {"status": "FAIL", "result": 2}});

        let ab = deep_merge(&deep_merge(&json!({}), &a), &b);
        let ba = deep_merge(&deep_merge(&json!({}), &b), &a);

        assert_eq!(ab["a"], a["a"]);
        assert_eq!(ab["b"], b["b"]);
        assert_eq!(ab.as_object().unwrap().len(), 2);
        // Same entries, only insertion order differs.
        assert_eq!(ab["a"], ba["a"]);
        assert_eq!(ab["b"], ba["b"]);
    }

    #[test]
    fn merge_into_keeps_insertion_order() {
        let mut dst = json!({"first": 1, "second": 2}).as_object().unwrap().clone();
        let src = json!({"third": 3, "first": 10}).as_object().unwrap().clone();

        merge_into(&mut dst, &src);

        let keys: Vec<_> = dst.keys().cloned().collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
        assert_eq!(dst["first"], 10);
    }
}
