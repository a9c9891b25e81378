//! Built-in predicates.
//!
//! Every predicate answers `false` on ill-typed input; nothing here panics on user data.

use crate::regex_cache;
use crate::registry::{ArgumentKind, Registry};
use crate::value::{parse_date, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::net::Ipv6Addr;

use ArgumentKind::{FlagOnly, Typed};

pub(crate) fn install(registry: &mut Registry) {
    // comparison
    registry.install_predicate("$eq", Typed, |a, b, _| a == b);
    registry.install_predicate("$ne", Typed, |a, b, _| a != b);
    registry.install_predicate("$gt", Typed, |a, b, _| ordered(a, b, Ordering::is_gt));
    registry.install_predicate("$gte", Typed, |a, b, _| ordered(a, b, Ordering::is_ge));
    registry.install_predicate("$lt", Typed, |a, b, _| ordered(a, b, Ordering::is_lt));
    registry.install_predicate("$lte", Typed, |a, b, _| ordered(a, b, Ordering::is_le));
    registry.install_predicate("$in", Typed, |a, b, _| {
        b.as_array().map_or(false, |items| contains(items, a))
    });
    registry.install_predicate("$nin", Typed, |a, b, _| {
        b.as_array().map_or(false, |items| !contains(items, a))
    });

    // array shape
    registry.install_predicate("$all", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| b.iter().all(|x| contains(a, x)))
    });
    registry.install_predicate("$size", Typed, |a, b, _| {
        matches!((a.as_array(), b.as_f64()), (Some(items), Some(n)) if items.len() as f64 == n)
    });
    registry.install_predicate("$length", Typed, |a, b, _| {
        let len = match a {
            Value::Array(items) => items.len(),
            Value::String(s) => s.chars().count(),
            _ => return false,
        };
        b.as_f64() == Some(len as f64)
    });
    registry.install_predicate("$disjoint", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| !a.iter().any(|x| contains(b, x)))
    });
    registry.install_predicate("$intersects", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| a.iter().any(|x| contains(b, x)))
    });
    registry.install_predicate("$subset", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| a.iter().all(|x| contains(b, x)))
    });
    registry.install_predicate("$superset", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| b.iter().all(|x| contains(a, x)))
    });
    registry.install_predicate("$includes", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| b.iter().all(|x| contains(a, x)))
    });
    registry.install_predicate("$excludes", Typed, |a, b, _| {
        both_arrays(a, b).map_or(false, |(a, b)| !b.iter().any(|x| contains(a, x)))
    });
    registry.install_predicate("$elemMatch", Typed, |a, b, cx| {
        a.as_array()
            .map_or(false, |items| items.iter().any(|item| cx.engine.matches(item, b)))
    });

    // logical
    registry.install_predicate("$and", Typed, |a, b, cx| {
        b.as_array()
            .map_or(false, |patterns| patterns.iter().all(|p| cx.engine.matches(a, p)))
    });
    registry.install_predicate("$or", Typed, |a, b, cx| {
        b.as_array()
            .map_or(false, |patterns| patterns.iter().any(|p| cx.engine.matches(a, p)))
    });
    registry.install_predicate("$nor", Typed, |a, b, cx| {
        b.as_array()
            .map_or(false, |patterns| !patterns.iter().any(|p| cx.engine.matches(a, p)))
    });
    registry.install_predicate("$not", Typed, |a, b, cx| !cx.engine.matches(a, b));

    // numeric
    registry.install_predicate("$isEven", FlagOnly, |a, _, _| number(a, |n| n % 2.0 == 0.0));
    registry.install_predicate("$isOdd", FlagOnly, |a, _, _| {
        number(a, |n| (n % 2.0).abs() == 1.0)
    });
    registry.install_predicate("$isInteger", FlagOnly, |a, _, _| {
        number(a, |n| n.is_finite() && n.fract() == 0.0)
    });
    registry.install_predicate("$isFloat", FlagOnly, |a, _, _| {
        number(a, |n| n.is_finite() && n.fract() != 0.0)
    });
    registry.install_predicate("$isNaN", FlagOnly, |a, _, _| number(a, f64::is_nan));
    registry.install_predicate("$isPrime", FlagOnly, |a, _, _| number(a, is_prime));
    registry.install_predicate("$mod", Typed, |a, b, _| {
        let (Some(n), Some(args)) = (a.as_f64(), b.as_array()) else {
            return false;
        };
        match (args.first().and_then(Value::as_f64), args.get(1).and_then(Value::as_f64)) {
            (Some(divisor), Some(remainder)) => n % divisor == remainder,
            _ => false,
        }
    });
    registry.install_predicate("$inRange", Typed, |a, b, _| {
        let (Some(n), Some(args)) = (a.as_f64(), b.as_array()) else {
            return false;
        };
        let (Some(min), Some(max)) = (
            args.first().and_then(Value::as_f64),
            args.get(1).and_then(Value::as_f64),
        ) else {
            return false;
        };
        let inclusive = args.get(2).map_or(true, Value::is_truthy);
        if inclusive {
            n >= min && n <= max
        } else {
            n > min && n < max
        }
    });

    // strings
    registry.install_predicate("$contains", Typed, |a, b, _| {
        match (a.as_str(), operand_text(b)) {
            (Some(s), Some(needle)) => s.contains(needle.as_str()),
            _ => false,
        }
    });
    registry.install_predicate("$startsWith", Typed, |a, b, _| {
        match (a.as_str(), operand_text(b)) {
            (Some(s), Some(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        }
    });
    registry.install_predicate("$endsWith", Typed, |a, b, _| {
        match (a.as_str(), operand_text(b)) {
            (Some(s), Some(suffix)) => s.ends_with(suffix.as_str()),
            _ => false,
        }
    });
    registry.install_predicate("$regex", Typed, |a, b, _| {
        match (a.as_str(), b.as_str()) {
            (Some(s), Some(pattern)) => {
                regex_cache::compile(pattern).map_or(false, |re| re.is_match(s))
            }
            _ => false,
        }
    });
    registry.install_predicate("$echoes", Typed, |a, b, _| {
        match (operand_text(a), operand_text(b)) {
            (Some(a), Some(b)) => soundex(&a) == soundex(&b),
            _ => false,
        }
    });

    // formats
    registry.install_predicate("$isAlpha", FlagOnly, |a, _, _| text_matches(a, &ALPHA));
    registry.install_predicate("$isAlphaNum", FlagOnly, |a, _, _| match a {
        Value::Number(n) => n.is_finite(),
        other => text_matches(other, &ALPHA_NUM),
    });
    registry.install_predicate("$isNumeric", FlagOnly, |a, _, _| match a {
        Value::Number(n) => n.is_finite() && n.fract() == 0.0 && *n >= 0.0,
        other => text_matches(other, &NUMERIC),
    });
    registry.install_predicate("$isHex", FlagOnly, |a, _, _| text_matches(a, &HEX));
    registry.install_predicate("$isBase64", FlagOnly, |a, _, _| {
        a.as_str().map_or(false, |s| !s.is_empty() && BASE64.is_match(s))
    });
    registry.install_predicate("$isEmail", FlagOnly, |a, _, _| text_matches(a, &EMAIL));
    registry.install_predicate("$isURL", FlagOnly, |a, _, _| text_matches(a, &URL));
    registry.install_predicate("$isUUID", FlagOnly, |a, _, _| {
        a.as_str()
            .map_or(false, |s| s.len() == 36 && uuid::Uuid::try_parse(s).is_ok())
    });
    registry.install_predicate("$isIP4", FlagOnly, |a, _, _| a.as_str().map_or(false, is_ipv4));
    registry.install_predicate("$isIP6", FlagOnly, |a, _, _| {
        a.as_str().map_or(false, |s| s.parse::<Ipv6Addr>().is_ok())
    });
    registry.install_predicate("$isSSN", FlagOnly, |a, _, _| text_matches(a, &SSN));
    registry.install_predicate("$isUSTel", FlagOnly, |a, _, _| text_matches(a, &US_TEL));
    registry.install_predicate("$isTime", FlagOnly, |a, _, _| text_matches(a, &TIME));
    registry.install_predicate("$isDate", FlagOnly, |a, _, _| match a {
        Value::Date(_) => true,
        Value::String(s) => parse_date(s).is_some(),
        _ => false,
    });
    registry.install_predicate("$isJSON", FlagOnly, |a, _, _| match a {
        Value::String(s) => serde_json::from_str::<serde_json::Value>(s).is_ok(),
        Value::Null | Value::Bool(_) => true,
        Value::Number(n) => n.is_finite(),
        _ => false,
    });

    // types
    registry.install_predicate("$exists", FlagOnly, |a, _, _| !a.is_nullish());
    registry.install_predicate("$typeof", Typed, |a, b, _| b.as_str() == Some(a.type_name()));
    registry.install_predicate("$instanceof", Typed, |a, b, _| {
        a.type_name() == "object" && is_kind(a, b)
    });
    registry.install_predicate("$kindof", Typed, |a, b, _| {
        b.as_str() == Some(a.type_name()) || is_kind(a, b)
    });
    registry.install_predicate("$cname", Typed, |a, b, _| is_kind(a, b));

    // temporal
    registry.install_predicate("$isAfter", Typed, |a, b, _| {
        ordered(&temporal(a), &temporal(b), Ordering::is_gt)
    });
    registry.install_predicate("$isBefore", Typed, |a, b, _| {
        ordered(&temporal(a), &temporal(b), Ordering::is_lt)
    });
    registry.install_predicate("$isBetween", Typed, |a, b, _| {
        let Some(args) = b.as_array() else {
            return false;
        };
        let (Some(start), Some(end)) = (args.first(), args.get(1)) else {
            return false;
        };
        let inclusive = args.get(2).map_or(false, Value::is_truthy);
        let (a, start, end) = (temporal(a), temporal(start), temporal(end));
        if inclusive {
            ordered(&a, &start, Ordering::is_ge) && ordered(&a, &end, Ordering::is_le)
        } else {
            ordered(&a, &start, Ordering::is_gt) && ordered(&a, &end, Ordering::is_lt)
        }
    });

    registry.install_predicate("$test", Typed, |a, b, cx| {
        b.as_function()
            .map_or(false, |f| f.call(&[a.clone(), cx.to_value()]).is_truthy())
    });
}

static ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z]*$").unwrap());
static ALPHA_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]*$").unwrap());
static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]*$").unwrap());
static BASE64: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$").unwrap()
});
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:https?|ftp)://[^\s/$.?#][^\s]*$").unwrap());
static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap());
static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}-\d{2}-\d{4}$").unwrap());
static US_TEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}-\d{3}-\d{4}$").unwrap());
static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d(?::[0-5]\d(?:\.\d{1,3})?)?$").unwrap()
});

fn ordered(a: &Value, b: &Value, test: fn(Ordering) -> bool) -> bool {
    a.natural_cmp(b).map_or(false, test)
}

fn contains(items: &[Value], needle: &Value) -> bool {
    items.iter().any(|item| item.same_value_zero(needle))
}

fn both_arrays<'a>(a: &'a Value, b: &'a Value) -> Option<(&'a [Value], &'a [Value])> {
    Some((a.as_array()?, b.as_array()?))
}

fn number(a: &Value, test: impl Fn(f64) -> bool) -> bool {
    a.as_f64().map_or(false, test)
}

/// Text form of a scalar operand; composite values have none.
fn operand_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(v.to_string()),
        _ => None,
    }
}

fn text_matches(a: &Value, re: &Regex) -> bool {
    a.as_str().map_or(false, |s| re.is_match(s))
}

fn is_ipv4(s: &str) -> bool {
    IPV4.captures(s).map_or(false, |caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .all(|octet| octet.as_str().parse::<u16>().map_or(false, |n| n <= 255))
    })
}

/// Largest integer an `f64` holds exactly; every `f64` above it is even.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(crate) fn is_prime(n: f64) -> bool {
    if !n.is_finite() || n.fract() != 0.0 || !(2.0..=MAX_SAFE_INTEGER).contains(&n) {
        return false;
    }
    let n = n as u64;
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3u64;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

/// Class marker of a rehydrated record: `{":": {"cname": "User"}, ...}`.
pub(crate) fn class_marker(a: &Value) -> Option<&str> {
    a.get(":").and_then(|marker| marker.get("cname")).and_then(Value::as_str)
}

fn is_kind(a: &Value, b: &Value) -> bool {
    if !a.is_truthy() {
        return false;
    }
    let Some(name) = b.as_str() else {
        return false;
    };
    a.class_name() == Some(name) || class_marker(a) == Some(name)
}

/// Dates and date-like strings compare as epoch milliseconds.
fn temporal(v: &Value) -> Value {
    match v {
        Value::Date(d) => Value::Number(d.timestamp_millis() as f64),
        Value::String(s) => parse_date(s)
            .map(|d| Value::Number(d.timestamp_millis() as f64))
            .unwrap_or_else(|| v.clone()),
        other => other.clone(),
    }
}

/// Four-character American Soundex code.
pub fn soundex(text: &str) -> String {
    fn class(c: char) -> char {
        match c {
            'B' | 'F' | 'P' | 'V' => '1',
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => '2',
            'D' | 'T' => '3',
            'L' => '4',
            'M' | 'N' => '5',
            'R' => '6',
            _ => '0',
        }
    }

    let upper = text.to_uppercase();
    let mut chars = upper.chars();
    let Some(first) = chars.next() else {
        return "0000".to_string();
    };
    let mut code = String::with_capacity(4);
    code.push(first);
    let mut previous = class(first);
    for c in chars {
        let current = class(c);
        if current != '0' && current != previous {
            code.push(current);
        }
        previous = current;
    }
    while code.chars().count() < 4 {
        code.push('0');
    }
    code.chars().take(4).collect()
}
