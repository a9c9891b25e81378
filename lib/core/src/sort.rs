//! Multi-key record sorting.
//!
//! Criteria can be written loosely and are normalized into [`SortCriterion`]:
//!
//! - `"age"` sorts ascending by `age`;
//! - `{"age": "desc"}` and `{"user": {"age": "desc"}}` name the path by nesting;
//! - `{"user": {"age": {"order": "desc"}}}` spells the direction out;
//! - `{"path": "user.age", "direction": "desc"}` is the canonical form.

use crate::error::{Error, Result};
use crate::value::{Record, Value, UNDEFINED};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidSortDirection(other.to_string())),
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sort key: a dotted path and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub path: String,
    pub direction: Direction,
}

impl SortCriterion {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: Direction::Desc,
        }
    }

    /// Normalize any accepted criterion shape.
    pub fn normalize(criterion: &Value) -> Result<Self> {
        match criterion {
            Value::String(path) => Ok(Self::asc(path.clone())),
            Value::Object(record) if record.contains_key("path") && record.contains_key("direction") => {
                let path = record
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::InvalidSortCriterion(criterion.to_json().to_string()))?;
                let direction = match record.get("direction") {
                    Some(Value::String(d)) => Direction::parse(d)?,
                    Some(other) => return Err(Error::InvalidSortDirection(other.to_string())),
                    None => Direction::Asc,
                };
                Ok(Self {
                    path: path.to_string(),
                    direction,
                })
            }
            Value::Object(record) => find_terminal(record, "")?
                .ok_or_else(|| Error::InvalidSortCriterion(criterion.to_json().to_string())),
            other => Err(Error::InvalidSortCriterion(other.to_json().to_string())),
        }
    }

    /// Compare two records on this key. Absent values go last in either direction.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let left = a.get_path(&self.path).unwrap_or(&UNDEFINED);
        let right = b.get_path(&self.path).unwrap_or(&UNDEFINED);
        match (left.is_undefined(), right.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.direction.apply(compare_values(left, right)),
        }
    }
}

/// Depth-first search for the first `path: "asc"|"desc"` or `path: {order: ...}` leaf.
fn find_terminal(record: &Record, prefix: &str) -> Result<Option<SortCriterion>> {
    for (key, value) in record.iter() {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::String(direction) => {
                return Ok(Some(SortCriterion {
                    path,
                    direction: Direction::parse(direction)?,
                }))
            }
            Value::Object(nested) => {
                if let Some(order) = nested.get("order").and_then(Value::as_str) {
                    return Ok(Some(SortCriterion {
                        path,
                        direction: Direction::parse(order)?,
                    }));
                }
                if let Some(found) = find_terminal(nested, &path)? {
                    return Ok(Some(found));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Rank of a value's kind in the sort order.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Undefined | Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Date(_) => 3,
        Value::String(_) => 4,
        Value::Binary(_) => 5,
        Value::Array(_) => 6,
        Value::Object(_) => 7,
        Value::Function(_) => 8,
    }
}

/// Total order for sort keys.
///
/// Kinds are ranked `null < boolean < number < date < string < binary < array <
/// record < function`. Within a kind: `NaN` sorts after every other number,
/// strings compare caselessly first and then with lowercase ahead of uppercase,
/// arrays compare element by element. Records and functions are all equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        },
        (Value::String(a), Value::String(b)) => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| b.cmp(a)),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

pub fn compare_by_criteria(a: &Value, b: &Value, criteria: &[SortCriterion]) -> Ordering {
    for criterion in criteria {
        let ordering = criterion.compare(a, b);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort of `records` by normalized criteria.
pub fn sort_by(records: &[Value], criteria: &[SortCriterion]) -> Vec<Value> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| compare_by_criteria(a, b, criteria));
    sorted
}

/// Normalize `criteria`, then sort. Fails on the first malformed criterion.
pub fn sort(records: &[Value], criteria: &[Value]) -> Result<Vec<Value>> {
    let criteria = criteria
        .iter()
        .map(SortCriterion::normalize)
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(keys = criteria.len(), records = records.len(), "Sorting records");
    Ok(sort_by(records, &criteria))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn values(json: serde_json::Value) -> Vec<Value> {
        match Value::from(json) {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    #[test]
    fn test_normalize_shapes() {
        assert_eq!(SortCriterion::normalize(&v(json!("age"))).unwrap(), SortCriterion::asc("age"));
        assert_eq!(
            SortCriterion::normalize(&v(json!({"age": "desc"}))).unwrap(),
            SortCriterion::desc("age")
        );
        assert_eq!(
            SortCriterion::normalize(&v(json!({"user": {"age": "desc"}}))).unwrap(),
            SortCriterion::desc("user.age")
        );
        assert_eq!(
            SortCriterion::normalize(&v(json!({"user": {"age": {"order": "asc"}}}))).unwrap(),
            SortCriterion::asc("user.age")
        );
        assert_eq!(
            SortCriterion::normalize(&v(json!({"path": "a.b", "direction": "desc"}))).unwrap(),
            SortCriterion::desc("a.b")
        );
    }

    #[test]
    fn test_normalize_errors() {
        assert!(matches!(
            SortCriterion::normalize(&v(json!({"age": "sideways"}))),
            Err(Error::InvalidSortDirection(_))
        ));
        assert!(matches!(
            SortCriterion::normalize(&v(json!(5))),
            Err(Error::InvalidSortCriterion(_))
        ));
        assert!(matches!(
            SortCriterion::normalize(&v(json!({"age": 1}))),
            Err(Error::InvalidSortCriterion(_))
        ));
    }

    #[test]
    fn test_multi_key_descending() {
        let records = values(json!([
            {"age": 30, "score": 100},
            {"age": 30, "score": 95},
            {"age": 25, "score": 100}
        ]));
        let sorted = sort(&records, &values(json!([{"age": "desc"}, {"score": "desc"}]))).unwrap();
        assert_eq!(
            sorted,
            values(json!([
                {"age": 30, "score": 100},
                {"age": 30, "score": 95},
                {"age": 25, "score": 100}
            ]))
        );
    }

    #[test]
    fn test_stable_ascending() {
        let records = values(json!([{"a": 1, "b": 2}, {"a": 1, "b": 1}]));
        let sorted = sort(&records, &values(json!(["a", "b"]))).unwrap();
        assert_eq!(sorted, values(json!([{"a": 1, "b": 1}, {"a": 1, "b": 2}])));

        let by_a_only = sort(&records, &values(json!(["a"]))).unwrap();
        assert_eq!(by_a_only, records);
    }

    #[test]
    fn test_undefined_last_both_directions() {
        let records = values(json!([{"x": 1}, {}, {"x": 3}]));
        let asc = sort_by(&records, &[SortCriterion::asc("x")]);
        assert_eq!(asc, values(json!([{"x": 1}, {"x": 3}, {}])));
        let desc = sort_by(&records, &[SortCriterion::desc("x")]);
        assert_eq!(desc, values(json!([{"x": 3}, {"x": 1}, {}])));
    }

    #[test]
    fn test_strings_and_dates() {
        let records = values(json!([{"n": "banana"}, {"n": "Apple"}, {"n": "apple"}]));
        let sorted = sort_by(&records, &[SortCriterion::asc("n")]);
        assert_eq!(sorted, values(json!([{"n": "apple"}, {"n": "Apple"}, {"n": "banana"}])));

        let early = crate::value::parse_date("2020-01-01").unwrap();
        let late = crate::value::parse_date("2021-01-01").unwrap();
        let mut a = Record::new();
        a.insert("d", Value::Date(late));
        let mut b = Record::new();
        b.insert("d", Value::Date(early));
        let sorted = sort_by(
            &[Value::Object(a.clone()), Value::Object(b.clone())],
            &[SortCriterion::asc("d")],
        );
        assert_eq!(sorted, vec![Value::Object(b), Value::Object(a)]);
    }

    #[test]
    fn test_mixed_kinds_sort_by_kind_then_value() {
        let records = values(json!([
            {"k": 3}, {"k": "b"}, {"k": 1}, {"k": true}, {"k": "A"}, {"k": null}, {"k": 2}, {}
        ]));
        let asc = sort_by(&records, &[SortCriterion::asc("k")]);
        assert_eq!(
            asc,
            values(json!([
                {"k": null}, {"k": true}, {"k": 1}, {"k": 2}, {"k": 3}, {"k": "A"}, {"k": "b"}, {}
            ]))
        );
        let desc = sort_by(&records, &[SortCriterion::desc("k")]);
        assert_eq!(
            desc,
            values(json!([
                {"k": "b"}, {"k": "A"}, {"k": 3}, {"k": 2}, {"k": 1}, {"k": true}, {"k": null}, {}
            ]))
        );
    }

    #[test]
    fn test_many_mixed_keys_keep_numbers_ordered() {
        let records: Vec<Value> = (0..200)
            .map(|i| {
                let k = if i % 3 == 0 {
                    json!(format!("s{:03}", (i * 7) % 200))
                } else {
                    json!((i * 37) % 101)
                };
                Value::from(json!({ "k": k }))
            })
            .collect();
        let sorted = sort_by(&records, &[SortCriterion::asc("k")]);
        let keys: Vec<&Value> = sorted.iter().filter_map(|r| r.get("k")).collect();
        let numbers: Vec<f64> = keys.iter().filter_map(|k| k.as_f64()).collect();
        assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
        let first_string = keys.iter().position(|k| k.as_str().is_some()).unwrap();
        assert!(keys[first_string..].iter().all(|k| k.as_str().is_some()));
    }

    #[test]
    fn test_nan_sorts_after_numbers() {
        let keys = [Value::from(2), Value::Number(f64::NAN), Value::from(-1)];
        let mut sorted = keys.to_vec();
        sorted.sort_by(compare_values);
        assert_eq!(sorted[0], Value::from(-1));
        assert_eq!(sorted[1], Value::from(2));
        assert!(sorted[2].as_f64().map_or(false, f64::is_nan));
        assert_eq!(compare_values(&Value::from(1), &Value::from("1")), Ordering::Less);
    }

    #[test]
    fn test_nested_paths() {
        let records = values(json!([{"u": {"age": 2}}, {"u": {"age": 1}}]));
        let sorted = sort(&records, &values(json!([{"u": {"age": "asc"}}]))).unwrap();
        assert_eq!(sorted, values(json!([{"u": {"age": 1}}, {"u": {"age": 2}}])));
    }
}
