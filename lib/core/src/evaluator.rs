//! Pattern evaluation.
//!
//! A pattern is a record whose keys are either operator names or property names.
//! Keys are processed in order against an owned working copy of the input:
//!
//! - predicates test the current subject and abort on failure;
//! - transforms project the subject. At the root the projection replaces the subject;
//!   under a property it becomes an assignment on the enclosing record;
//! - nested records recurse into the named property, and the assignments they produce
//!   are applied before the next sibling key is looked at;
//! - anything else must equal the property strictly.
//!
//! Every assignment is also recorded as an [`Edit`] addressed from the root, so a
//! caller can replay the evaluation onto its own copy with [`apply_edits`].

use crate::path::expand_record;
use crate::registry::{self, ArgumentKind, Assignment, EditAction, MatchContext, Projection, Registry};
use crate::value::{Record, Value, UNDEFINED};
use std::sync::Arc;
use tracing::trace;

/// A write performed during evaluation. An empty path addresses the input itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub path: Vec<String>,
    pub action: EditAction,
}

/// A successful evaluation together with the writes that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    pub edits: Vec<Edit>,
}

/// Replay `edits` onto `target` in order.
pub fn apply_edits(target: &mut Value, edits: &[Edit]) {
    for edit in edits {
        apply_edit(target, edit);
    }
}

fn apply_edit(target: &mut Value, edit: &Edit) {
    let Some((last, parents)) = edit.path.split_last() else {
        *target = match &edit.action {
            EditAction::Set(value) => value.clone(),
            EditAction::Delete => Value::Undefined,
        };
        return;
    };
    let mut current = target;
    for segment in parents {
        current = match current.get_mut(segment) {
            Some(next) => next,
            None => return,
        };
    }
    match &edit.action {
        EditAction::Set(value) => current.set_field(last, value.clone()),
        EditAction::Delete => current.delete_field(last),
    }
}

#[derive(Clone, Copy)]
struct Scope<'a> {
    property: &'a str,
    record: &'a Value,
}

struct Outcome {
    value: Value,
    /// Writes destined for the record enclosing this subject.
    assignments: Vec<Assignment>,
}

/// Evaluates patterns against values using one registry snapshot.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<Registry>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine over the current process-wide registry.
    pub fn new() -> Self {
        Self {
            registry: registry::global(),
        }
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Operators registered here are private to this engine (and its clones made afterwards).
    pub fn registry_mut(&mut self) -> &mut Registry {
        Arc::make_mut(&mut self.registry)
    }

    /// Evaluate `pattern` against `data`. `None` means no match.
    pub fn evaluate(&self, data: &Value, pattern: &Value) -> Option<Value> {
        self.query(data, pattern, 0)
    }

    /// Evaluate `pattern` against each element of a sequence, keeping the survivors.
    pub fn evaluate_each(&self, data: &Value, pattern: &Value) -> Option<Value> {
        self.query(data, pattern, 1)
    }

    /// Evaluation with an explicit recursion depth: while `depth > 0`, sequences are
    /// filtered element by element instead of being matched as a whole.
    pub fn query(&self, data: &Value, pattern: &Value, depth: usize) -> Option<Value> {
        if depth > 0 {
            if let Value::Array(items) = data {
                let survivors = items
                    .iter()
                    .filter_map(|item| self.query(item, pattern, depth - 1))
                    .collect();
                return Some(Value::Array(survivors));
            }
        }
        self.evaluate_with_edits(data, pattern).map(|evaluation| evaluation.value)
    }

    pub fn evaluate_with_edits(&self, data: &Value, pattern: &Value) -> Option<Evaluation> {
        let mut edits = Vec::new();
        let value = match pattern {
            Value::Object(record) => {
                let mut path = Vec::new();
                self.eval_record(data.clone(), record, None, &mut path, &mut edits)?
                    .value
            }
            literal if data == literal => data.clone(),
            _ => return None,
        };
        Some(Evaluation { value, edits })
    }

    pub fn matches(&self, data: &Value, pattern: &Value) -> bool {
        self.evaluate(data, pattern).is_some()
    }

    fn context<'a>(&'a self, scope: Option<Scope<'a>>) -> MatchContext<'a> {
        MatchContext {
            engine: self,
            property: scope.map(|s| s.property),
            record: scope.map(|s| s.record),
        }
    }

    fn eval_record(
        &self,
        mut subject: Value,
        pattern: &Record,
        scope: Option<Scope<'_>>,
        path: &mut Vec<String>,
        log: &mut Vec<Edit>,
    ) -> Option<Outcome> {
        let pattern = expand_record(pattern);
        let mut assignments = Vec::new();

        for (key, argument) in pattern.iter() {
            if let Some(predicate) = self.registry.predicate(key) {
                if predicate.argument_kind() == ArgumentKind::Typed && !argument.is_truthy() {
                    continue;
                }
                if !predicate.test(&subject, argument, &self.context(scope)) {
                    trace!(operator = %key, "Predicate rejected subject");
                    return None;
                }
                continue;
            }

            if let Some(transform) = self.registry.transform(key) {
                let projection = transform.apply(&subject, argument, &self.context(scope));
                let alias = argument.get("as").and_then(Value::as_str);
                match (projection, scope) {
                    (Projection::NoMatch, _) | (Projection::Value(Value::Undefined), _) => {
                        trace!(operator = %key, "Transform produced no value");
                        return None;
                    }
                    (Projection::Unchanged, _) => {}
                    (Projection::Value(value), Some(scope)) => {
                        assignments.push(Assignment::set(alias.unwrap_or(scope.property), value));
                    }
                    (Projection::Value(value), None) => {
                        log.push(Edit {
                            path: path.clone(),
                            action: EditAction::Set(value.clone()),
                        });
                        subject = value;
                    }
                    (Projection::Drop, Some(scope)) => {
                        assignments.push(Assignment::delete(scope.property));
                    }
                    (Projection::Drop, None) => return None,
                    (Projection::Deferred(deferred), Some(scope)) => {
                        let key = alias.unwrap_or(scope.property);
                        assignments.extend(deferred(scope.record, key, &subject));
                    }
                    (Projection::Deferred(deferred), None) => {
                        // Without an enclosing record only an aliased write has a target.
                        if let (Some(key), Value::Object(_)) = (alias, &subject) {
                            let previous = subject.get(key).cloned().unwrap_or_default();
                            let writes = deferred(&subject, key, &previous);
                            apply_assignments(&mut subject, writes, path, log);
                        }
                    }
                }
                continue;
            }

            if let Value::Object(nested) = argument {
                let child = subject.get(key).cloned().unwrap_or_default();
                path.push(key.clone());
                let outcome = self.eval_record(
                    child.clone(),
                    nested,
                    Some(Scope {
                        property: key,
                        record: &subject,
                    }),
                    path,
                    log,
                );
                path.pop();
                let outcome = outcome?;
                if outcome.value != child {
                    subject.set_field(key, outcome.value);
                }
                apply_assignments(&mut subject, outcome.assignments, path, log);
                continue;
            }

            if subject.get(key).unwrap_or(&UNDEFINED) != argument {
                trace!(property = %key, "Literal mismatch");
                return None;
            }
        }

        Some(Outcome {
            value: subject,
            assignments,
        })
    }
}

fn apply_assignments(
    subject: &mut Value,
    assignments: Vec<Assignment>,
    path: &[String],
    log: &mut Vec<Edit>,
) {
    for Assignment { key, action } in assignments {
        match &action {
            EditAction::Set(value) => subject.set_field(&key, value.clone()),
            EditAction::Delete => subject.delete_field(&key),
        }
        let mut edit_path = path.to_vec();
        edit_path.push(key);
        log.push(Edit {
            path: edit_path,
            action,
        });
    }
}

/// [`Engine::evaluate`] on a fresh engine over the process-wide registry.
pub fn evaluate(data: &Value, pattern: &Value) -> Option<Value> {
    Engine::new().evaluate(data, pattern)
}

/// [`Engine::evaluate_each`] on a fresh engine over the process-wide registry.
pub fn evaluate_each(data: &Value, pattern: &Value) -> Option<Value> {
    Engine::new().evaluate_each(data, pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ArgumentKind;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_all_of_sequence() {
        let data = v(json!([1, 2, 3, 4]));
        assert_eq!(evaluate(&data, &v(json!({"$all": [1, 2]}))), Some(data.clone()));
        assert_eq!(evaluate(&data, &v(json!({"$all": [5]}))), None);
    }

    #[test]
    fn test_nested_predicate() {
        let data = v(json!({"x": 5}));
        assert_eq!(evaluate(&data, &v(json!({"x": {"$gt": 3}}))), Some(data.clone()));
        assert_eq!(evaluate(&data, &v(json!({"x": {"$gt": 7}}))), None);
    }

    #[test]
    fn test_literal_equality() {
        let data = v(json!({"a": {"b": "c"}, "n": 1}));
        assert!(evaluate(&data, &v(json!({"a.b": "c"}))).is_some());
        assert!(evaluate(&data, &v(json!({"n": 1}))).is_some());
        assert!(evaluate(&data, &v(json!({"n": "1"}))).is_none());
        assert!(evaluate(&data, &v(json!({"missing": null}))).is_none());
    }

    #[test]
    fn test_type_mismatch_never_panics() {
        assert_eq!(evaluate(&v(json!("str")), &v(json!({"$size": 3}))), None);
        assert_eq!(evaluate(&v(json!(null)), &v(json!({"a": {"b": {"$gt": 1}}}))), None);
    }

    #[test]
    fn test_root_transform_threads_subject() {
        let result = evaluate(&v(json!(5)), &v(json!({"$pow": {"value": 2}, "$gt": 20})));
        assert_eq!(result, Some(Value::from(25)));
    }

    #[test]
    fn test_transform_writes_into_record() {
        let result = evaluate(&v(json!({"x": "5"})), &v(json!({"x": {"$toNumber": {}}})));
        assert_eq!(result, Some(v(json!({"x": 5}))));

        let aliased = evaluate(
            &v(json!({"x": "5"})),
            &v(json!({"x": {"$toNumber": {"as": "n"}}})),
        );
        assert_eq!(aliased, Some(v(json!({"x": "5", "n": 5}))));
    }

    #[test]
    fn test_assignments_visible_to_later_siblings() {
        let pattern = v(json!({"s": {"$toNumber": {"as": "n"}}, "n": {"$gt": 3}}));
        assert!(evaluate(&v(json!({"s": "5"})), &pattern).is_some());
        assert!(evaluate(&v(json!({"s": "2"})), &pattern).is_none());
    }

    #[test]
    fn test_deep_edits_replay() {
        let data = v(json!({"user": {"name": "joe", "age": "20", "tmp": 1}}));
        let pattern = v(json!({
            "user": {"age": {"$toNumber": {}}, "tmp": {"$drop": true}, "name": {"$capitalize": {}}}
        }));
        let evaluation = Engine::new().evaluate_with_edits(&data, &pattern).unwrap();
        assert_eq!(
            evaluation.value,
            v(json!({"user": {"name": "Joe", "age": 20}}))
        );
        assert_eq!(evaluation.edits.len(), 3);
        assert_eq!(evaluation.edits[1].path, ["user", "tmp"]);
        assert_eq!(evaluation.edits[1].action, EditAction::Delete);

        let mut replayed = data.clone();
        apply_edits(&mut replayed, &evaluation.edits);
        assert_eq!(replayed, evaluation.value);
    }

    #[test]
    fn test_root_edit_replay() {
        let evaluation = Engine::new()
            .evaluate_with_edits(&v(json!("  hi ")), &v(json!({"$trim": {}})))
            .unwrap();
        let mut replayed = v(json!("  hi "));
        apply_edits(&mut replayed, &evaluation.edits);
        assert_eq!(replayed, Value::from("hi"));
    }

    #[test]
    fn test_root_drop_is_no_match() {
        assert_eq!(evaluate(&v(json!(1)), &v(json!({"$drop": true}))), None);
    }

    #[test]
    fn test_evaluate_each_filters() {
        let data = v(json!([{"v": 1}, {"v": 5}, {"v": 7}]));
        let result = evaluate_each(&data, &v(json!({"v": {"$gt": 3}})));
        assert_eq!(result, Some(v(json!([{"v": 5}, {"v": 7}]))));

        let empty = evaluate_each(&data, &v(json!({"v": {"$gt": 30}})));
        assert_eq!(empty, Some(v(json!([]))));

        assert_eq!(evaluate_each(&v(json!(4)), &v(json!({"$isEven": true}))), Some(Value::from(4)));
    }

    #[test]
    fn test_private_registry() {
        let mut engine = Engine::new();
        engine
            .registry_mut()
            .register_predicate_fn("$isPositive", ArgumentKind::FlagOnly, |a, _, _| {
                a.as_f64().map_or(false, |n| n > 0.0)
            })
            .unwrap();
        assert!(engine.matches(&Value::from(5), &v(json!({"$isPositive": true}))));
        assert!(!engine.matches(&Value::from(-5), &v(json!({"$isPositive": true}))));
        assert!(Engine::new().registry().predicate("$isPositive").is_none());
    }

    #[test]
    fn test_custom_transform_with_options() {
        let mut engine = Engine::new();
        engine
            .registry_mut()
            .register_transform_fn("$multiply", |a, o, _| {
                let factor = o.get("factor").and_then(Value::as_f64).unwrap_or(2.0);
                a.as_f64().map(|n| Value::Number(n * factor)).into()
            })
            .unwrap();
        assert_eq!(
            engine.evaluate(&Value::from(5), &v(json!({"$multiply": {"factor": 3}}))),
            Some(Value::from(15))
        );
        assert_eq!(
            engine.evaluate(&Value::from(5), &v(json!({"$multiply": {}}))),
            Some(Value::from(10))
        );
    }
}
