//! Dotted-path expansion for patterns.

use crate::registry::OPERATOR_SIGIL;
use crate::value::{Record, Value};
use smallvec::SmallVec;

/// Rewrite top-level `"a.b.c": v` keys into nested records `{a: {b: {c: v}}}`.
///
/// Chains that share a prefix are merged, as are plain keys whose value is a record
/// landing on an existing chain. Operator keys pass through untouched. Non-record
/// patterns are returned as-is.
pub fn expand_dot_path(pattern: &Value) -> Value {
    match pattern {
        Value::Object(record) => Value::Object(expand_record(record)),
        other => other.clone(),
    }
}

pub(crate) fn expand_record(record: &Record) -> Record {
    if !record
        .keys()
        .any(|k| k.contains('.') && !k.starts_with(OPERATOR_SIGIL))
    {
        return record.clone();
    }

    let mut expanded = Record::with_capacity(record.len());
    for (key, value) in record.iter() {
        if key.starts_with(OPERATOR_SIGIL) || !key.contains('.') {
            merge_leaf(&mut expanded, key, value);
            continue;
        }
        let segments: SmallVec<[&str; 4]> = key.split('.').collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };
        let mut current = &mut expanded;
        for segment in parents {
            current = current.record_entry(segment);
        }
        merge_leaf(current, last, value);
    }
    expanded
}

fn merge_leaf(target: &mut Record, key: &str, value: &Value) {
    match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming.iter() {
                merge_leaf(existing, k, v);
            }
        }
        _ => {
            target.insert(key, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_expands_dotted_keys() {
        let expanded = expand_dot_path(&v(json!({"a.b.c": 1})));
        assert_eq!(expanded, v(json!({"a": {"b": {"c": 1}}})));
    }

    #[test]
    fn test_merges_shared_prefixes() {
        let expanded = expand_dot_path(&v(json!({"a.b": 1, "a.c": {"$gt": 2}, "d": 3})));
        assert_eq!(expanded, v(json!({"a": {"b": 1, "c": {"$gt": 2}}, "d": 3})));
    }

    #[test]
    fn test_merges_plain_record_into_chain() {
        let expanded = expand_dot_path(&v(json!({"a.b": 1, "a": {"c": 2}})));
        assert_eq!(expanded, v(json!({"a": {"b": 1, "c": 2}})));
    }

    #[test]
    fn test_operator_keys_untouched() {
        let pattern = v(json!({"$or": [{"a.b": 1}], "x": 2}));
        assert_eq!(expand_dot_path(&pattern), pattern);
    }

    #[test]
    fn test_idempotent() {
        let once = expand_dot_path(&v(json!({"a.b": 1, "a.c.d": 2, "e": {"f": 3}})));
        assert_eq!(expand_dot_path(&once), once);
    }

    #[test]
    fn test_non_record_passthrough() {
        assert_eq!(expand_dot_path(&Value::from(5)), Value::from(5));
    }
}
