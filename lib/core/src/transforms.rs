//! Built-in transforms.
//!
//! Options arrive as a record (`{"$pow": {"value": 3}}`). Missing options take the
//! documented defaults; options of the wrong type make the transform a no-match.

use crate::expr;
use crate::predicates::class_marker;
use crate::regex_cache;
use crate::registry::{Assignment, Projection, Registry};
use crate::sort::compare_values;
use crate::value::{date_from_millis, parse_date, Record, Value, UNDEFINED};
use ahash::AHashMap;
use chrono::{DateTime, Datelike, Timelike, Utc};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Ordering;

type UnaryMath = fn(f64) -> f64;

const UNARY_MATH: &[(&str, UnaryMath)] = &[
    ("$abs", f64::abs),
    ("$acos", f64::acos),
    ("$acosh", f64::acosh),
    ("$asin", f64::asin),
    ("$asinh", f64::asinh),
    ("$atan", f64::atan),
    ("$atanh", f64::atanh),
    ("$cbrt", f64::cbrt),
    ("$ceil", f64::ceil),
    ("$clz32", clz32),
    ("$cos", f64::cos),
    ("$cosh", f64::cosh),
    ("$exp", f64::exp),
    ("$expm1", f64::exp_m1),
    ("$floor", f64::floor),
    ("$fround", fround),
    ("$log10", f64::log10),
    ("$log1p", f64::ln_1p),
    ("$log2", f64::log2),
    ("$round", round_half_up),
    ("$sign", sign),
    ("$sin", f64::sin),
    ("$sinh", f64::sinh),
    ("$sqrt", f64::sqrt),
    ("$tan", f64::tan),
    ("$tanh", f64::tanh),
    ("$trunc", f64::trunc),
];

pub(crate) fn install(registry: &mut Registry) {
    install_aggregates(registry);
    install_arrays(registry);
    install_strings(registry);
    install_math(registry);
    install_reflective(registry);
    registry.install_transform("$dateFormat", |a, o, _| date_format(a, o).into());
}

fn install_aggregates(registry: &mut Registry) {
    registry.install_transform("$sum", |a, o, _| {
        operands(a, o, true).map(|ns| Value::Number(ns.iter().sum())).into()
    });
    registry.install_transform("$average", |a, o, _| {
        operands(a, o, true)
            .filter(|ns| !ns.is_empty())
            .map(|ns| Value::Number(ns.iter().sum::<f64>() / ns.len() as f64))
            .into()
    });
    registry.install_transform("$min", |a, o, _| {
        operands(a, o, true)
            .and_then(|ns| ns.into_iter().reduce(f64::min))
            .map(Value::Number)
            .into()
    });
    registry.install_transform("$max", |a, o, _| {
        operands(a, o, true)
            .and_then(|ns| ns.into_iter().reduce(f64::max))
            .map(Value::Number)
            .into()
    });
    registry.install_transform("$product", |a, o, _| product(a, o).into());
    registry.install_transform("$dot", |a, o, _| dot(a, o).into());
    registry.install_transform("$hypot", |a, o, _| {
        operands(a, o, true)
            .map(|ns| Value::Number(ns.iter().map(|n| n * n).sum::<f64>().sqrt()))
            .into()
    });
    registry.install_transform("$percentile", |a, o, _| {
        let Some(mut values) = operands(a, o, false) else {
            return Projection::NoMatch;
        };
        let p = number_opt(o, "p").unwrap_or(50.0);
        values.sort_by(f64::total_cmp);
        percentile(&values, p).map(Value::Number).into()
    });
    registry.install_transform("$statistics", |a, o, _| {
        operands(a, o, false).and_then(statistics).into()
    });
}

fn install_arrays(registry: &mut Registry) {
    registry.install_transform("$chunk", |a, o, _| {
        let (Some(items), size) = (a.as_array(), number_opt(o, "size").unwrap_or(1.0)) else {
            return Projection::NoMatch;
        };
        if !(size >= 1.0) {
            return Projection::NoMatch;
        }
        let chunks = items
            .chunks(size as usize)
            .map(|chunk| Value::Array(chunk.to_vec()))
            .collect();
        Projection::Value(Value::Array(chunks))
    });
    registry.install_transform("$compact", |a, _, _| {
        a.as_array()
            .map(|items| Value::Array(items.iter().filter(|v| !v.is_nullish()).cloned().collect()))
            .into()
    });
    registry.install_transform("$difference", |a, o, _| difference(a, o).into());
    registry.install_transform("$setDifference", |a, o, _| difference(a, o).into());
    registry.install_transform("$intersection", |a, o, _| {
        with_array_opt(a, o, |items, other| {
            items.iter().filter(|x| contains(other, x)).cloned().collect()
        })
    });
    registry.install_transform("$union", |a, o, _| {
        with_array_opt(a, o, |items, other| unique(items.iter().chain(other)))
    });
    registry.install_transform("$unique", |a, _, _| {
        a.as_array().map(|items| Value::Array(unique(items.iter()))).into()
    });
    registry.install_transform("$flatten", |a, o, _| {
        let Some(items) = a.as_array() else {
            return Projection::NoMatch;
        };
        let depth = number_opt(o, "depth").map_or(usize::MAX, |d| d.max(0.0) as usize);
        let mut flat = Vec::with_capacity(items.len());
        flatten_into(items, depth, &mut flat);
        Projection::Value(Value::Array(flat))
    });
    registry.install_transform("$groupBy", |a, o, _| group_by(a, o).into());
    registry.install_transform("$slice", |a, o, _| {
        let Some(items) = a.as_array() else {
            return Projection::NoMatch;
        };
        let len = items.len();
        let start = relative_index(number_opt(o, "start").unwrap_or(0.0), len);
        let end = number_opt(o, "end").map_or(len, |e| relative_index(e, len));
        let slice = if start < end { items[start..end].to_vec() } else { Vec::new() };
        Projection::Value(Value::Array(slice))
    });
    registry.install_transform("$splice", |a, o, _| {
        let Some(items) = a.as_array() else {
            return Projection::NoMatch;
        };
        let Some(inserted) = array_opt(o, "items") else {
            return Projection::NoMatch;
        };
        let mut items = items.to_vec();
        let start = relative_index(number_opt(o, "start").unwrap_or(0.0), items.len());
        let delete = number_opt(o, "deleteCount")
            .map_or(0, |d| d.max(0.0) as usize)
            .min(items.len() - start);
        items.splice(start..start + delete, inserted.iter().cloned());
        Projection::Value(Value::Array(items))
    });
    registry.install_transform("$sort", |a, o, _| {
        let Some(items) = a.as_array() else {
            return Projection::NoMatch;
        };
        let mut items = items.to_vec();
        match opt(o, "compare") {
            Value::Function(compare) => items.sort_by(|x, y| {
                let order = compare.call(&[x.clone(), y.clone()]).as_f64().unwrap_or(0.0);
                order.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
            }),
            _ => {
                items.sort_by(compare_values);
                if opt(o, "order").as_str() == Some("desc") {
                    items.reverse();
                }
            }
        }
        Projection::Value(Value::Array(items))
    });
    registry.install_transform("$push", |a, o, _| {
        with_array_opt(a, o, |items, other| items.iter().chain(other).cloned().collect())
    });
    registry.install_transform("$unshift", |a, o, _| {
        with_array_opt(a, o, |items, other| other.iter().chain(items).cloned().collect())
    });
    registry.install_transform("$pop", |a, _, _| {
        a.as_array().and_then(|items| items.last().cloned()).into()
    });
    registry.install_transform("$shift", |a, _, _| {
        a.as_array().and_then(|items| items.first().cloned()).into()
    });
}

fn install_strings(registry: &mut Registry) {
    registry.install_transform("$capitalize", |a, _, _| {
        a.as_str()
            .map(|s| {
                let mut chars = s.chars();
                let capitalized: String = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                };
                Value::String(capitalized)
            })
            .into()
    });
    registry.install_transform("$trim", |a, _, _| {
        a.as_str().map(|s| Value::from(s.trim())).into()
    });
    registry.install_transform("$split", |a, o, _| {
        let Some(s) = a.as_str() else {
            return Projection::NoMatch;
        };
        let parts: Vec<Value> = match opt(o, "separator") {
            Value::Undefined => vec![Value::from(s)],
            Value::String(sep) if sep.is_empty() => {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            }
            Value::String(sep) => s.split(sep.as_str()).map(Value::from).collect(),
            _ => return Projection::NoMatch,
        };
        Projection::Value(Value::Array(parts))
    });
    registry.install_transform("$join", |a, o, _| {
        let Some(items) = a.as_array() else {
            return Projection::NoMatch;
        };
        let separator = opt(o, "separator").as_str().unwrap_or(",");
        let parts: Vec<String> = items
            .iter()
            .map(|v| if v.is_nullish() { String::new() } else { v.to_string() })
            .collect();
        Projection::Value(Value::String(parts.join(separator)))
    });
    registry.install_transform("$replace", |a, o, _| replace(a, o).into());
    registry.install_transform("$toBoolean", |a, o, _| to_boolean(a, o).into());
    registry.install_transform("$toDate", |a, _, _| {
        match a {
            Value::Date(d) => Some(*d),
            Value::Number(n) => date_from_millis(*n),
            Value::String(s) => parse_date(s),
            _ => None,
        }
        .map(Value::Date)
        .into()
    });
    registry.install_transform("$toNumber", |a, o, _| {
        to_number(a, number_opt(o, "radix").map_or(10, |r| r as u32))
            .filter(|n| !n.is_nan())
            .map(Value::Number)
            .into()
    });
    registry.install_transform("$toString", |a, o, _| {
        if a.is_nullish() && !opt(o, "allowNull").is_truthy() {
            return Projection::NoMatch;
        }
        Projection::Value(Value::String(a.to_string()))
    });
    registry.install_transform("$format", |a, o, _| format(a, o).into());
}

fn install_math(registry: &mut Registry) {
    for &(name, f) in UNARY_MATH {
        registry.install_transform(name, move |a, _, _| a.as_f64().map(|n| Value::Number(f(n))).into());
    }
    registry.install_transform("$atan2", |a, o, _| {
        binary(a, number_opt(o, "b"), f64::atan2)
    });
    registry.install_transform("$pow", |a, o, _| {
        binary(a, number_opt(o, "value"), f64::powf)
    });
    registry.install_transform("$imul", |a, o, _| {
        binary(a, number_opt(o, "value"), |x, y| {
            f64::from(to_int32(x).wrapping_mul(to_int32(y)))
        })
    });
    registry.install_transform("$log", |a, o, _| {
        let base = number_opt(o, "value").unwrap_or(std::f64::consts::E);
        binary(a, Some(base), |x, b| x.ln() / b.ln())
    });
    registry.install_transform("$clamp", |a, o, _| {
        match (a.as_f64(), number_opt(o, "min"), number_opt(o, "max")) {
            (Some(n), Some(min), Some(max)) => Projection::Value(Value::Number(n.max(min).min(max))),
            _ => Projection::NoMatch,
        }
    });
    registry.install_transform("$lerp", |a, o, _| {
        match (a.as_f64(), number_opt(o, "target"), number_opt(o, "alpha")) {
            (Some(n), Some(target), Some(alpha)) => {
                Projection::Value(Value::Number(n + (target - n) * alpha))
            }
            _ => Projection::NoMatch,
        }
    });
    registry.install_transform("$normalize", |a, o, _| {
        match (a.as_f64(), number_opt(o, "min"), number_opt(o, "max")) {
            (Some(n), Some(min), Some(max)) => {
                Projection::Value(Value::Number((n - min) / (max - min)))
            }
            _ => Projection::NoMatch,
        }
    });
}

fn install_reflective(registry: &mut Registry) {
    registry.install_transform("$keys", |a, _, _| {
        members(a, |key, _| Value::from(key)).into()
    });
    registry.install_transform("$values", |a, _, _| {
        members(a, |_, value| value).into()
    });
    registry.install_transform("$entries", |a, _, _| {
        members(a, |key, value| Value::Array(vec![Value::from(key), value])).into()
    });
    registry.install_transform("$type", |a, _, _| Projection::Value(Value::from(a.type_name())));
    registry.install_transform("$classname", |a, _, _| {
        class_marker(a)
            .or_else(|| a.class_name())
            .map(Value::from)
            .into()
    });
    registry.install_transform("$default", |a, o, _| {
        if a.is_nullish() {
            Projection::Value(opt(o, "value").clone())
        } else {
            Projection::Unchanged
        }
    });
    registry.install_transform("$parse", |a, _, _| {
        a.as_str()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
            .map(Value::from)
            .into()
    });
    registry.install_transform("$stringify", |a, o, _| stringify(a, opt(o, "space")).map(Value::String).into());
    registry.install_transform("$eval", |a, _, _| {
        match a {
            Value::String(source) => expr::evaluate(source),
            Value::Number(n) => Some(*n),
            _ => None,
        }
        .map(Value::Number)
        .into()
    });
    registry.install_transform("$call", |a, o, _| {
        let f = match o {
            Value::Function(f) => f,
            other => match opt(other, "f") {
                Value::Function(f) => f,
                _ => return Projection::NoMatch,
            },
        };
        Projection::Value(f.call(std::slice::from_ref(a)))
    });
    registry.install_transform("$define", |a, o, _| {
        let value = match opt(o, "value") {
            v if v.is_truthy() => v.clone(),
            _ => a.clone(),
        };
        Projection::Deferred(Box::new(move |_record, key, _previous| {
            vec![Assignment::set(key, value)]
        }))
    });
    registry.install_transform("$drop", |a, o, cx| {
        let drop = match o {
            Value::Function(f) => f.call(&[a.clone(), cx.to_value()]).is_truthy(),
            flag => flag.is_truthy(),
        };
        if drop {
            Projection::Drop
        } else {
            Projection::Unchanged
        }
    });
}

fn opt<'a>(options: &'a Value, key: &str) -> &'a Value {
    options.get(key).unwrap_or(&UNDEFINED)
}

fn number_opt(options: &Value, key: &str) -> Option<f64> {
    opt(options, key).as_f64()
}

/// A missing array option reads as empty; a present non-array is rejected.
fn array_opt<'a>(options: &'a Value, key: &str) -> Option<&'a [Value]> {
    match opt(options, key) {
        Value::Undefined => Some(&[]),
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Subject (a number or array of numbers), then `value` if asked for, then `array`.
fn operands(subject: &Value, options: &Value, with_value: bool) -> Option<Vec<f64>> {
    let mut numbers = Vec::new();
    match subject {
        Value::Number(n) => numbers.push(*n),
        Value::Array(items) => {
            for item in items {
                numbers.push(item.as_f64()?);
            }
        }
        _ => return None,
    }
    if with_value {
        match opt(options, "value") {
            Value::Undefined => {}
            Value::Number(n) => numbers.push(*n),
            _ => return None,
        }
    }
    for item in array_opt(options, "array")? {
        numbers.push(item.as_f64()?);
    }
    Some(numbers)
}

fn product(subject: &Value, options: &Value) -> Option<Value> {
    match subject {
        Value::Array(items) => {
            let factor = number_opt(options, "value").unwrap_or(1.0);
            let others = array_opt(options, "array")?;
            let mut out = Vec::with_capacity(items.len() * (1 + others.len()));
            for x in items {
                out.push(Value::Number(x.as_f64()? * factor));
            }
            for x in items {
                let x = x.as_f64()?;
                for y in others {
                    out.push(Value::Number(x * y.as_f64()?));
                }
            }
            Some(Value::Array(out))
        }
        _ => operands(subject, options, true).map(|ns| Value::Number(ns.iter().product())),
    }
}

fn dot(subject: &Value, options: &Value) -> Option<Value> {
    if let (Value::Array(left), Value::Array(right)) = (subject, opt(options, "array")) {
        if left.len() == right.len() {
            let mut sum = 0.0;
            for (x, y) in left.iter().zip(right) {
                sum += x.as_f64()? * y.as_f64()?;
            }
            return Some(Value::Number(sum));
        }
    }
    operands(subject, options, true).map(|ns| Value::Number(ns.iter().map(|n| n * n).sum()))
}

/// Linear interpolation between the closest ranks of `sorted`.
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = (p / 100.0) * (sorted.len() - 1) as f64;
    let (floor, ceil) = (index.floor(), index.ceil());
    let (lo, hi) = (
        *sorted.get(floor as usize)?,
        *sorted.get(ceil as usize)?,
    );
    if floor == ceil {
        Some(lo)
    } else {
        Some(lo * (ceil - index) + hi * (index - floor))
    }
}

fn statistics(mut values: Vec<f64>) -> Option<Value> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let count = n as f64;
    let mean = values.iter().sum::<f64>() / count;
    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    };
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;

    let mut counts: AHashMap<OrderedFloat<f64>, usize> = AHashMap::with_capacity(n);
    let (mut mode, mut best) = (values[0], 0);
    for &x in &values {
        let seen = counts.entry(OrderedFloat(x)).or_insert(0);
        *seen += 1;
        if *seen > best {
            best = *seen;
            mode = x;
        }
    }

    let (min, max) = (values[0], values[n - 1]);
    let mut stats = Record::with_capacity(9);
    stats.insert("mean", Value::Number(mean));
    stats.insert("median", Value::Number(median));
    stats.insert("mode", Value::Number(mode));
    stats.insert("variance", Value::Number(variance));
    stats.insert("stdDev", Value::Number(variance.sqrt()));
    stats.insert("min", Value::Number(min));
    stats.insert("max", Value::Number(max));
    stats.insert("range", Value::Number(max - min));
    stats.insert("count", Value::from(n));
    Some(Value::Object(stats))
}

fn contains(items: &[Value], needle: &Value) -> bool {
    items.iter().any(|item| item.same_value_zero(needle))
}

fn unique<'a>(items: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !contains(&out, item) {
            out.push(item.clone());
        }
    }
    out
}

fn with_array_opt(
    subject: &Value,
    options: &Value,
    f: impl FnOnce(&[Value], &[Value]) -> Vec<Value>,
) -> Projection {
    match (subject, opt(options, "array")) {
        (Value::Array(items), Value::Array(other)) => Projection::Value(Value::Array(f(items, other))),
        _ => Projection::NoMatch,
    }
}

fn difference(subject: &Value, options: &Value) -> Option<Value> {
    match (subject, opt(options, "array")) {
        (Value::Array(items), Value::Array(other)) => Some(Value::Array(
            items.iter().filter(|x| !contains(other, x)).cloned().collect(),
        )),
        _ => None,
    }
}

fn flatten_into(items: &[Value], depth: usize, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(nested) if depth > 0 => flatten_into(nested, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

fn group_by(subject: &Value, options: &Value) -> Option<Value> {
    let items = subject.as_array()?;
    let key = opt(options, "key");
    let mut groups = Record::new();
    for item in items {
        let group = match key {
            Value::Function(f) => f.call(std::slice::from_ref(item)).to_string(),
            Value::String(k) => item.get(k).unwrap_or(&UNDEFINED).to_string(),
            _ => return None,
        };
        match groups.get_mut(&group) {
            Some(Value::Array(members)) => members.push(item.clone()),
            _ => {
                groups.insert(group, Value::Array(vec![item.clone()]));
            }
        }
    }
    Some(Value::Object(groups))
}

/// Resolve a possibly negative index against `len`, clamped to `0..=len`.
fn relative_index(index: f64, len: usize) -> usize {
    if index.is_nan() {
        0
    } else if index < 0.0 {
        (len as f64 + index.trunc()).max(0.0) as usize
    } else {
        (index.trunc() as usize).min(len)
    }
}

fn replace(subject: &Value, options: &Value) -> Option<Value> {
    let text = subject.as_str()?;
    let pattern = opt(options, "pattern").as_str()?;
    let replacement = match opt(options, "replacement") {
        Value::String(s) => s.clone(),
        Value::Undefined => String::new(),
        other => other.to_string(),
    };
    let flags = opt(options, "flags").as_str().unwrap_or("");
    let source = if flags.contains('i') {
        format!("(?i){}", pattern)
    } else {
        pattern.to_string()
    };
    let re = regex_cache::compile(&source)?;
    let replaced = if flags.contains('g') {
        re.replace_all(text, replacement.as_str())
    } else {
        re.replace(text, replacement.as_str())
    };
    Some(Value::String(replaced.into_owned()))
}

fn to_boolean(subject: &Value, options: &Value) -> Option<Value> {
    fn listed(options: &Value, key: &str, defaults: &[&str], word: &str) -> bool {
        match opt(options, key) {
            Value::Array(items) => items.iter().any(|v| v.as_str() == Some(word)),
            _ => defaults.contains(&word),
        }
    }

    match subject {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) => {
            let word = s.to_lowercase();
            if listed(options, "truthy", &["true", "1", "yes"], &word) {
                Some(Value::Bool(true))
            } else if listed(options, "falsy", &["false", "0", "no"], &word) {
                Some(Value::Bool(false))
            } else {
                Some(Value::Bool(subject.is_truthy()))
            }
        }
        other => Some(Value::Bool(other.is_truthy())),
    }
}

fn to_number(subject: &Value, radix: u32) -> Option<f64> {
    match subject {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Date(d) => Some(d.timestamp_millis() as f64),
        Value::String(s) => parse_number(s.trim(), radix),
        _ => None,
    }
}

fn parse_number(text: &str, radix: u32) -> Option<f64> {
    if text.is_empty() {
        return Some(0.0);
    }
    let lower = text.to_ascii_lowercase();
    for (prefix, base) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return i64::from_str_radix(digits, base).ok().map(|n| n as f64);
        }
    }
    if radix != 10 && (2..=36).contains(&radix) {
        return i64::from_str_radix(&lower, radix).ok().map(|n| n as f64);
    }
    match text.trim_start_matches(['+', '-']) {
        "Infinity" => Some(if text.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY }),
        rest if rest.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) => {
            text.parse().ok()
        }
        _ => None,
    }
}

/// Substitute `${path}` placeholders from the subject and `values`, the subject winning
/// unless `precedence` is `"values"`.
fn format(subject: &Value, options: &Value) -> Option<Value> {
    if subject.is_nullish() {
        return None;
    }
    let template = opt(options, "template").as_str()?;
    let values = opt(options, "values");
    let (primary, secondary) = if opt(options, "precedence").as_str() == Some("values") {
        (values, subject)
    } else {
        (subject, values)
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let path = after[..end].trim();
        let value = primary
            .get_path(path)
            .or_else(|| secondary.get_path(path))
            .unwrap_or(&UNDEFINED);
        out.push_str(&value.to_string());
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(Value::String(out))
}

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const WEEKDAYS: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

fn date_format(subject: &Value, options: &Value) -> Option<Value> {
    let date = match subject {
        Value::Date(d) => *d,
        Value::Number(n) => date_from_millis(*n)?,
        Value::String(s) => parse_date(s)?,
        _ => return None,
    };
    let format = opt(options, "format").as_str().unwrap_or("YYYY-MM-DD");

    let mut out = String::with_capacity(format.len() + 8);
    let mut word = String::new();
    for c in format.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        flush_word(&mut out, &mut word, &date);
        out.push(c);
    }
    flush_word(&mut out, &mut word, &date);
    Some(Value::String(out))
}

fn flush_word(out: &mut String, word: &mut String, date: &DateTime<Utc>) {
    if word.is_empty() {
        return;
    }
    match date_token(word, date) {
        Some(rendered) => out.push_str(&rendered),
        None => out.push_str(word),
    }
    word.clear();
}

fn date_token(token: &str, d: &DateTime<Utc>) -> Option<String> {
    let month = d.month0() as usize;
    let weekday = d.weekday().num_days_from_sunday() as usize;
    let hour12 = match d.hour() % 12 {
        0 => 12,
        h => h,
    };
    Some(match token {
        "YYYY" => d.year().to_string(),
        "YY" => format!("{:02}", d.year().rem_euclid(100)),
        "MMMM" => MONTHS[month].to_string(),
        "MMM" => MONTHS[month][..3].to_string(),
        "MM" => format!("{:02}", month + 1),
        "M" => (month + 1).to_string(),
        "DD" => format!("{:02}", d.day()),
        "D" => d.day().to_string(),
        "dddd" => WEEKDAYS[weekday].to_string(),
        "ddd" => WEEKDAYS[weekday][..3].to_string(),
        "d" => weekday.to_string(),
        "HH" => format!("{:02}", d.hour()),
        "H" => d.hour().to_string(),
        "hh" => format!("{:02}", hour12),
        "h" => hour12.to_string(),
        "mm" => format!("{:02}", d.minute()),
        "m" => d.minute().to_string(),
        "ss" => format!("{:02}", d.second()),
        "s" => d.second().to_string(),
        "SSS" => format!("{:03}", d.timestamp_subsec_millis()),
        "A" => if d.hour() < 12 { "AM" } else { "PM" }.to_string(),
        "a" => if d.hour() < 12 { "am" } else { "pm" }.to_string(),
        _ => return None,
    })
}

/// Keys, values or entries of a record, array or string.
fn members(subject: &Value, f: impl Fn(String, Value) -> Value) -> Option<Value> {
    let out = match subject {
        Value::Undefined | Value::Null => return None,
        Value::Object(record) => record.iter().map(|(k, v)| f(k.clone(), v.clone())).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| f(i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| f(i.to_string(), Value::String(c.to_string())))
            .collect(),
        _ => Vec::new(),
    };
    Some(Value::Array(out))
}

fn stringify(subject: &Value, space: &Value) -> Option<String> {
    if subject.is_undefined() || matches!(subject, Value::Function(_)) {
        return None;
    }
    let json = subject.to_json();
    let indent = match space {
        Value::Number(n) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    if indent.is_empty() {
        return serde_json::to_string(&json).ok();
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut serializer).ok()?;
    String::from_utf8(buf).ok()
}

fn binary(subject: &Value, operand: Option<f64>, f: impl Fn(f64, f64) -> f64) -> Projection {
    match (subject.as_f64(), operand) {
        (Some(a), Some(b)) => Projection::Value(Value::Number(f(a, b))),
        _ => Projection::NoMatch,
    }
}

fn to_int32(n: f64) -> i32 {
    if n.is_finite() {
        (n.trunc() as i64) as i32
    } else {
        0
    }
}

fn clz32(n: f64) -> f64 {
    f64::from((to_int32(n) as u32).leading_zeros())
}

fn fround(n: f64) -> f64 {
    f64::from(n as f32)
}

/// Rounds halves towards positive infinity.
fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

fn sign(n: f64) -> f64 {
    if n == 0.0 || n.is_nan() {
        n
    } else {
        n.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Engine;
    use crate::value::Function;
    use serde_json::json;

    fn run(subject: serde_json::Value, pattern: serde_json::Value) -> Option<Value> {
        Engine::new().evaluate(&Value::from(subject), &Value::from(pattern))
    }

    fn expect(subject: serde_json::Value, pattern: serde_json::Value, expected: serde_json::Value) {
        assert_eq!(run(subject, pattern), Some(Value::from(expected)));
    }

    fn with_function(name: &str, key: &str, f: Function) -> Value {
        let mut options = Record::new();
        options.insert(key, Value::Function(f));
        let mut pattern = Record::new();
        pattern.insert(name, Value::Object(options));
        Value::Object(pattern)
    }

    #[test]
    fn test_aggregates() {
        expect(json!(1), json!({"$average": {"array": [2, 3]}}), json!(2));
        expect(json!(10), json!({"$average": {"array": [20, 30], "value": 40}}), json!(25));
        expect(json!(1), json!({"$sum": {"value": 2, "array": [3]}}), json!(6));
        expect(json!(5), json!({"$min": {"array": [3, 9]}}), json!(3));
        expect(json!(5), json!({"$max": {"array": [3, 9]}}), json!(9));
        expect(json!([1, 2]), json!({"$product": {"value": 2, "array": [3]}}), json!([2, 4, 3, 6]));
        expect(json!(2), json!({"$dot": {"value": 3, "array": [4]}}), json!(29));
        expect(json!(0), json!({"$dot": {"value": 1}}), json!(1));
        expect(json!([1, 2, 3]), json!({"$dot": {"array": [4, 5, 6]}}), json!(32));
        expect(json!(3), json!({"$hypot": {"value": 4}}), json!(5));
        expect(json!(5), json!({"$percentile": {"array": [1, 2, 3, 4], "p": 50}}), json!(3));
    }

    #[test]
    fn test_statistics() {
        let stats = run(json!(1), json!({"$statistics": {"array": [2, 3, 4, 5]}})).unwrap();
        assert_eq!(stats.get("mean"), Some(&Value::from(3)));
        assert_eq!(stats.get("median"), Some(&Value::from(3)));
        assert_eq!(stats.get("mode"), Some(&Value::from(1)));
        assert_eq!(stats.get("variance"), Some(&Value::from(2)));
        assert_eq!(stats.get("range"), Some(&Value::from(4)));
        assert_eq!(stats.get("count"), Some(&Value::from(5)));
    }

    #[test]
    fn test_arrays() {
        expect(json!([1, 2, 3, 4]), json!({"$chunk": {"size": 2}}), json!([[1, 2], [3, 4]]));
        expect(json!([1, 2, 3]), json!({"$chunk": {"size": 2}}), json!([[1, 2], [3]]));
        expect(json!([1, null, 2, 3]), json!({"$compact": {}}), json!([1, 2, 3]));
        expect(json!([1, 2, 3]), json!({"$difference": {"array": [2, 3, 4]}}), json!([1]));
        expect(json!([1, 2, 3]), json!({"$setDifference": {"array": [2, 3, 4]}}), json!([1]));
        expect(json!([1, 2, 3]), json!({"$intersection": {"array": [2, 3, 4]}}), json!([2, 3]));
        expect(json!([1, 2]), json!({"$union": {"array": [2, 3]}}), json!([1, 2, 3]));
        expect(json!([1, 2, 2, 3, 3]), json!({"$unique": {}}), json!([1, 2, 3]));
        expect(json!([1, [2, [3, 4]]]), json!({"$flatten": {}}), json!([1, 2, 3, 4]));
        expect(json!([1, [2, [3, 4]]]), json!({"$flatten": {"depth": 1}}), json!([1, 2, [3, 4]]));
        expect(json!([1, 2, 3, 4]), json!({"$slice": {"start": 1, "end": 3}}), json!([2, 3]));
        expect(json!([1, 2, 3, 4]), json!({"$slice": {"start": -2}}), json!([3, 4]));
        expect(
            json!([1, 2, 3]),
            json!({"$splice": {"start": 1, "deleteCount": 1, "items": [4]}}),
            json!([1, 4, 3]),
        );
        expect(json!([3, 1, 4, 2]), json!({"$sort": {}}), json!([1, 2, 3, 4]));
        expect(json!([1, 2]), json!({"$push": {"array": [3, 4]}}), json!([1, 2, 3, 4]));
        expect(json!([3, 4]), json!({"$unshift": {"array": [1, 2]}}), json!([1, 2, 3, 4]));
        expect(json!([1, 2, 3]), json!({"$pop": {}}), json!(3));
        expect(json!([1, 2, 3]), json!({"$shift": {}}), json!(1));
        assert_eq!(run(json!([]), json!({"$shift": {}})), None);
    }

    #[test]
    fn test_group_by() {
        let data = json!([
            {"type": "a", "value": 1},
            {"type": "b", "value": 2},
            {"type": "a", "value": 3}
        ]);
        expect(
            data,
            json!({"$groupBy": {"key": "type"}}),
            json!({
                "a": [{"type": "a", "value": 1}, {"type": "a", "value": 3}],
                "b": [{"type": "b", "value": 2}]
            }),
        );
    }

    #[test]
    fn test_sort_with_compare_function() {
        let descending = Function::new(|args| {
            let (a, b) = (args[0].as_f64().unwrap_or(0.0), args[1].as_f64().unwrap_or(0.0));
            Value::Number(b - a)
        });
        let pattern = with_function("$sort", "compare", descending);
        let sorted = Engine::new().evaluate(&Value::from(json!([3, 1, 4, 2])), &pattern);
        assert_eq!(sorted, Some(Value::from(json!([4, 3, 2, 1]))));
    }

    #[test]
    fn test_sort_mixed_kinds() {
        expect(
            json!([3, "b", 1, "a", 2, null, false]),
            json!({"$sort": {}}),
            json!([null, false, 1, 2, 3, "a", "b"]),
        );
        expect(
            json!([3, "b", 1, "a", 2]),
            json!({"$sort": {"order": "desc"}}),
            json!(["b", "a", 3, 2, 1]),
        );
    }

    #[test]
    fn test_strings() {
        expect(json!("test"), json!({"$capitalize": {}}), json!("Test"));
        expect(json!("TEST"), json!({"$capitalize": {}}), json!("TEST"));
        expect(json!("  test  "), json!({"$trim": {}}), json!("test"));
        expect(json!("a,b,c"), json!({"$split": {"separator": ","}}), json!(["a", "b", "c"]));
        expect(json!(["a", "b", "c"]), json!({"$join": {"separator": ", "}}), json!("a, b, c"));
        expect(
            json!("test test"),
            json!({"$replace": {"pattern": "test", "replacement": "fix", "flags": "g"}}),
            json!("fix fix"),
        );
        expect(
            json!("test test"),
            json!({"$replace": {"pattern": "test", "replacement": "fix"}}),
            json!("fix test"),
        );
    }

    #[test]
    fn test_conversions() {
        expect(json!("true"), json!({"$toBoolean": {}}), json!(true));
        expect(json!("no"), json!({"$toBoolean": {}}), json!(false));
        expect(json!("42"), json!({"$toNumber": {}}), json!(42));
        expect(json!("0xFF"), json!({"$toNumber": {"radix": 16}}), json!(255));
        assert_eq!(run(json!("invalid"), json!({"$toNumber": {}})), None);
        expect(json!(42), json!({"$toString": {}}), json!("42"));
        expect(json!(null), json!({"$toString": {"allowNull": true}}), json!("null"));
        assert_eq!(run(json!(null), json!({"$toString": {}})), None);

        let date = run(json!("2023-01-01"), json!({"$toDate": {}})).unwrap();
        assert_eq!(date, Value::Date(parse_date("2023-01-01").unwrap()));
        assert_eq!(run(json!("invalid"), json!({"$toDate": {}})), None);
    }

    #[test]
    fn test_format() {
        expect(
            json!({"name": "John", "age": 30}),
            json!({"$format": {"template": "Name: ${name}, Age: ${age}", "values": {"title": "Mr."}}}),
            json!("Name: John, Age: 30"),
        );
        expect(
            json!({"name": "John"}),
            json!({"$format": {"template": "${title} ${name}", "values": {"title": "Mr.", "name": "Jack"}}}),
            json!("Mr. John"),
        );
        expect(
            json!({"name": "John"}),
            json!({"$format": {
                "template": "${name}",
                "values": {"name": "Jack"},
                "precedence": "values"
            }}),
            json!("Jack"),
        );
        expect(
            json!({"user": {"name": "Ann"}}),
            json!({"$format": {"template": "Hi ${user.name}"}}),
            json!("Hi Ann"),
        );
    }

    #[test]
    fn test_math() {
        expect(json!(-5), json!({"$abs": {}}), json!(5));
        expect(json!(2), json!({"$pow": {"value": 3}}), json!(8));
        expect(json!(4), json!({"$sqrt": {}}), json!(2));
        expect(json!(1.6), json!({"$round": {}}), json!(2));
        expect(json!(-5), json!({"$sign": {}}), json!(-1));
        expect(json!(2), json!({"$clz32": {}}), json!(30));
        expect(json!(2), json!({"$imul": {"value": 3}}), json!(6));
        expect(json!(8), json!({"$log2": {}}), json!(3));
        expect(json!(std::f64::consts::E), json!({"$log": {}}), json!(1));
        expect(json!(15), json!({"$clamp": {"min": 0, "max": 10}}), json!(10));
        expect(json!(0), json!({"$lerp": {"target": 10, "alpha": 0.5}}), json!(5));
        expect(json!(5), json!({"$normalize": {"min": 0, "max": 10}}), json!(0.5));
        assert_eq!(run(json!("x"), json!({"$sqrt": {}})), None);
    }

    #[test]
    fn test_date_format() {
        let date = json!("2023-01-01T12:30:45");
        expect(date.clone(), json!({"$dateFormat": {"format": "YYYY-MM-DD"}}), json!("2023-01-01"));
        expect(date.clone(), json!({"$dateFormat": {"format": "HH:mm:ss"}}), json!("12:30:45"));
        expect(date.clone(), json!({"$dateFormat": {"format": "MMM DD, YYYY"}}), json!("Jan 01, 2023"));
        expect(date, json!({"$dateFormat": {"format": "dddd h A"}}), json!("Sunday 12 PM"));
        assert_eq!(run(json!("invalid"), json!({"$dateFormat": {}})), None);
    }

    #[test]
    fn test_reflective() {
        expect(json!({"a": 1, "b": 2}), json!({"$keys": {}}), json!(["a", "b"]));
        expect(json!({"a": 1, "b": 2}), json!({"$values": {}}), json!([1, 2]));
        expect(json!({"a": 1, "b": 2}), json!({"$entries": {}}), json!([["a", 1], ["b", 2]]));
        expect(json!(42), json!({"$type": {}}), json!("number"));
        expect(json!([]), json!({"$classname": {}}), json!("Array"));
        expect(json!(null), json!({"$default": {"value": "default"}}), json!("default"));
        expect(json!("value"), json!({"$default": {"value": "default"}}), json!("value"));
        expect(json!("{\"a\":1}"), json!({"$parse": {}}), json!({"a": 1}));
        assert_eq!(run(json!("invalid"), json!({"$parse": {}})), None);
        expect(json!({"a": 1}), json!({"$stringify": {"space": 2}}), json!("{\n  \"a\": 1\n}"));
        expect(json!("2 * (3 + 4)"), json!({"$eval": {}}), json!(14));
        assert_eq!(run(json!("process.exit()"), json!({"$eval": {}})), None);
    }

    #[test]
    fn test_call() {
        let double = Function::new(|args| Value::Number(args[0].as_f64().unwrap_or(0.0) * 2.0));
        let pattern = with_function("$call", "f", double);
        assert_eq!(Engine::new().evaluate(&Value::from(5), &pattern), Some(Value::from(10)));
    }

    #[test]
    fn test_define_under_property() {
        expect(
            json!({"prop": "test"}),
            json!({"prop": {"$define": {"value": "fixed"}}}),
            json!({"prop": "fixed"}),
        );
        expect(
            json!({"prop": "test"}),
            json!({"prop": {"$define": {"as": "copy"}}}),
            json!({"prop": "test", "copy": "test"}),
        );
    }

    #[test]
    fn test_drop() {
        let person = json!({"name": "joe", "age": 20});
        expect(person.clone(), json!({"name": {"$drop": true}}), json!({"age": 20}));
        expect(person.clone(), json!({"name": {"$drop": false}}), person.clone());

        let under_21 = Function::new(|args| {
            let age = args[1].get_path("object.age").and_then(Value::as_f64).unwrap_or(0.0);
            Value::Bool(age < 21.0)
        });
        let mut name = Record::new();
        name.insert("$drop", Value::Function(under_21));
        let mut pattern = Record::new();
        pattern.insert("name", Value::Object(name));
        let result = Engine::new().evaluate(&Value::from(person), &Value::Object(pattern));
        assert_eq!(result, Some(Value::from(json!({"age": 20}))));
    }
}
