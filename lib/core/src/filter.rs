//! Safe filter dialect for document stores.
//!
//! Selectors handed to a [`DocumentStore`](crate::find::DocumentStore) are restricted to
//! a whitelist of comparison and logical operators and flattened to dotted paths, so a
//! backend only ever sees `{"a.b": {"$op": arg}}` clauses it can translate.

use crate::evaluator::Engine;
use crate::registry::OPERATOR_SIGIL;
use crate::value::{Record, Value};

pub const SAFE_OPERATORS: [&str; 19] = [
    "$lt", "$lte", "$eq", "$ne", "$gte", "$gt", "$exists", "$type", "$in", "$nin", "$size",
    "$mod", "$regex", "$or", "$and", "$nor", "$not", "$all", "$elemMatch",
];

const COMBINATORS: [&str; 3] = ["$and", "$or", "$nor"];

pub fn is_safe_operator(key: &str) -> bool {
    SAFE_OPERATORS.contains(&key)
}

fn is_operator(key: &str) -> bool {
    key.starts_with(OPERATOR_SIGIL)
}

/// Rewrite a raw selector into the safe dialect.
///
/// Unknown operators are dropped silently. Literal leaves become `{"$eq": leaf}`.
/// The output is a fixed point: normalizing it again changes nothing.
pub fn normalize_filter_query(raw: &Value) -> Value {
    match raw {
        Value::Object(record) => Value::Object(normalize_record(record)),
        other => other.clone(),
    }
}

fn normalize_record(record: &Record) -> Record {
    if record.len() == 1 {
        if let Some((key, clauses)) = record.iter().next() {
            if COMBINATORS.contains(&key.as_str()) {
                let mut out = Record::with_capacity(1);
                out.insert(key.clone(), normalize_clauses(clauses));
                return out;
            }
        }
    }
    let mut out = Record::with_capacity(record.len());
    collect(record, "", &mut out);
    out
}

fn normalize_clauses(clauses: &Value) -> Value {
    match clauses {
        Value::Array(items) => Value::Array(items.iter().map(normalize_filter_query).collect()),
        other => other.clone(),
    }
}

fn collect(record: &Record, prefix: &str, out: &mut Record) {
    for (key, value) in record.iter() {
        if is_operator(key) {
            if !is_safe_operator(key) {
                tracing::trace!(operator = %key, "Dropping operator outside the safe dialect");
                continue;
            }
            let value = if COMBINATORS.contains(&key.as_str()) {
                normalize_clauses(value)
            } else {
                value.clone()
            };
            let target = if prefix.is_empty() {
                &mut *out
            } else {
                out.record_entry(prefix)
            };
            target.insert(key.clone(), value);
            continue;
        }

        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(nested) if nested.keys().any(|k| is_operator(k)) => {
                if nested.keys().filter(|k| is_operator(k)).all(|k| is_safe_operator(k)) {
                    out.insert(path, value.clone());
                }
            }
            Value::Object(nested) => collect(nested, &path, out),
            leaf => {
                let mut clause = Record::with_capacity(1);
                clause.insert("$eq", leaf.clone());
                out.insert(path, Value::Object(clause));
            }
        }
    }
}

/// A record-level test.
pub trait Filter {
    fn matches(&self, record: &Value) -> bool;
}

/// A selector normalized into the safe dialect, evaluated with an [`Engine`].
pub struct SafeFilter {
    selector: Value,
    engine: Engine,
}

impl SafeFilter {
    pub fn new(raw: &Value) -> Self {
        Self::with_engine(raw, Engine::new())
    }

    pub fn with_engine(raw: &Value, engine: Engine) -> Self {
        Self {
            selector: normalize_filter_query(raw),
            engine,
        }
    }

    pub fn selector(&self) -> &Value {
        &self.selector
    }
}

impl Filter for SafeFilter {
    fn matches(&self, record: &Value) -> bool {
        self.engine.matches(record, &self.selector)
    }
}
