//! Find pipeline: store lookup, then projection, filtering and ordering.

use crate::error::Result;
use crate::evaluator::Engine;
use crate::filter::{normalize_filter_query, Filter, SafeFilter};
use crate::sort::sort;
use crate::value::{Record, Value};
use tracing::debug;

/// A source of records that can answer a safe-dialect selector.
pub trait DocumentStore {
    /// Records matching `selector`, which is already in the safe dialect.
    fn find(&self, selector: &Value) -> Vec<Value>;
}

impl DocumentStore for [Value] {
    fn find(&self, selector: &Value) -> Vec<Value> {
        let filter = SafeFilter::new(selector);
        self.iter().filter(|record| filter.matches(record)).cloned().collect()
    }
}

impl DocumentStore for Vec<Value> {
    fn find(&self, selector: &Value) -> Vec<Value> {
        self.as_slice().find(selector)
    }
}

/// What to fetch and how to shape it.
#[derive(Debug, Clone, Default)]
pub struct FindRequest {
    /// Passed to the store after normalization.
    pub selector: Option<Value>,
    /// Pattern applied to every record; records it rejects are dropped.
    pub transform: Option<Value>,
    /// Pattern applied after `transform`.
    pub filter: Option<Value>,
    /// Sort criteria in any accepted shape.
    pub order: Vec<Value>,
}

impl FindRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(mut self, selector: Value) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn transform(mut self, transform: Value) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, criterion: Value) -> Self {
        self.order.push(criterion);
        self
    }
}

impl Engine {
    pub fn find<S>(&self, store: &S, request: &FindRequest) -> Result<Vec<Value>>
    where
        S: DocumentStore + ?Sized,
    {
        let selector = request
            .selector
            .as_ref()
            .map(normalize_filter_query)
            .unwrap_or_else(|| Value::Object(Record::new()));
        let mut records = Value::Array(store.find(&selector));
        debug!(
            found = records.as_array().map_or(0, |items| items.len()),
            "Store lookup complete"
        );

        for pattern in [&request.transform, &request.filter].into_iter().flatten() {
            records = self.evaluate_each(&records, pattern).unwrap_or(Value::Array(Vec::new()));
        }

        let records = match records {
            Value::Array(items) => items,
            other => vec![other],
        };
        if request.order.is_empty() {
            return Ok(records);
        }
        sort(&records, &request.order)
    }
}

/// [`Engine::find`] on a fresh engine over the process-wide registry.
pub fn find<S>(store: &S, request: &FindRequest) -> Result<Vec<Value>>
where
    S: DocumentStore + ?Sized,
{
    Engine::new().find(store, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Vec<Value> {
        match Value::from(json!([
            {"name": "ann", "age": 31, "city": "paris"},
            {"name": "bob", "age": 17, "city": "rome"},
            {"name": "cy", "age": 45, "city": "paris"},
            {"name": "dee", "age": 28, "city": "paris"}
        ])) {
            Value::Array(items) => items,
            _ => unreachable!(),
        }
    }

    fn names(records: &[Value]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn test_selector_only() {
        let request = FindRequest::new().selector(Value::from(json!({"city": "paris"})));
        let found = find(people().as_slice(), &request).unwrap();
        assert_eq!(names(&found), ["ann", "cy", "dee"]);
    }

    #[test]
    fn test_full_pipeline() {
        let request = FindRequest::new()
            .selector(Value::from(json!({"city": "paris"})))
            .transform(Value::from(json!({"name": {"$capitalize": {}}})))
            .filter(Value::from(json!({"age": {"$lt": 40}})))
            .order(Value::from(json!({"age": "desc"})));
        let found = find(&people(), &request).unwrap();
        assert_eq!(names(&found), ["Ann", "Dee"]);
    }

    #[test]
    fn test_selector_drops_unsafe_operators() {
        let request = FindRequest::new().selector(Value::from(json!({"name": {"$echoes": "an"}})));
        let found = find(&people(), &request).unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_bad_order_is_error() {
        let request = FindRequest::new().order(Value::from(json!({"age": "up"})));
        assert!(find(&people(), &request).is_err());
    }
}
