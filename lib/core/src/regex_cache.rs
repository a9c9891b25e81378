//! Process-wide cache of compiled user-supplied patterns (`$regex`, `$replace`).

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

/// Patterns past this many are compiled on every use.
pub(crate) const CAPACITY: usize = 64;

static CACHE: Lazy<RwLock<AHashMap<String, Regex>>> =
    Lazy::new(|| RwLock::new(AHashMap::with_capacity(CAPACITY)));

/// Compiled `pattern`, or `None` if it does not compile.
pub(crate) fn compile(pattern: &str) -> Option<Regex> {
    if let Some(re) = CACHE.read().get(pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(pattern).ok()?;
    let mut cache = CACHE.write();
    if cache.len() < CAPACITY {
        cache.insert(pattern.to_string(), re.clone());
    }
    Some(re)
}
