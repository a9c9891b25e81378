//! Operator registries.
//!
//! Predicates and transforms are looked up by their `$`-prefixed name. The process-wide
//! registry is filled with the built-in operators on first use and can be extended with
//! [`register_predicate`] / [`register_transform`]. Extension is copy-on-write: engines
//! that already hold a snapshot keep seeing the operators they started with.

use crate::error::{Error, Result};
use crate::evaluator::Engine;
use crate::value::Value;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub const OPERATOR_SIGIL: char = '$';

/// How a predicate consumes its pattern argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArgumentKind {
    /// The argument is a flag; the test runs no matter what it holds (`{"$isEven": true}`).
    FlagOnly,
    /// The argument is an operand. A falsy operand means "no assertion".
    #[default]
    Typed,
}

/// What an operator sees of its surroundings when evaluated under a nested key.
#[derive(Clone, Copy)]
pub struct MatchContext<'a> {
    pub engine: &'a Engine,
    /// Key under which the subject was found.
    pub property: Option<&'a str>,
    /// The record holding `property`.
    pub record: Option<&'a Value>,
}

impl<'a> MatchContext<'a> {
    pub fn root(engine: &'a Engine) -> Self {
        Self {
            engine,
            property: None,
            record: None,
        }
    }

    /// `{property, object}` as handed to caller-supplied functions.
    pub fn to_value(&self) -> Value {
        let mut record = crate::value::Record::with_capacity(2);
        record.insert(
            "property",
            self.property.map(Value::from).unwrap_or(Value::Undefined),
        );
        record.insert("object", self.record.cloned().unwrap_or(Value::Undefined));
        Value::Object(record)
    }
}

/// A boolean test over a subject.
pub trait Predicate: Send + Sync {
    fn argument_kind(&self) -> ArgumentKind {
        ArgumentKind::Typed
    }

    fn test(&self, subject: &Value, argument: &Value, cx: &MatchContext<'_>) -> bool;
}

/// A single write produced by a transform, relative to the record it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: String,
    pub action: EditAction,
}

impl Assignment {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            action: EditAction::Set(value),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            action: EditAction::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditAction {
    Set(Value),
    Delete,
}

/// Closure run against `(record, target key, previous value)` once a transform's
/// surroundings are known.
pub type Deferred = Box<dyn FnOnce(&Value, &str, &Value) -> Vec<Assignment>>;

/// Result of applying a transform.
pub enum Projection {
    /// New value for the subject.
    Value(Value),
    /// Keep the subject as it is.
    Unchanged,
    /// Remove the field holding the subject.
    Drop,
    Deferred(Deferred),
    NoMatch,
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Projection::Unchanged => f.write_str("Unchanged"),
            Projection::Drop => f.write_str("Drop"),
            Projection::Deferred(_) => f.write_str("Deferred"),
            Projection::NoMatch => f.write_str("NoMatch"),
        }
    }
}

impl From<Option<Value>> for Projection {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Projection::NoMatch, Projection::Value)
    }
}

/// A projection of a subject into a new value.
pub trait Transform: Send + Sync {
    fn apply(&self, subject: &Value, options: &Value, cx: &MatchContext<'_>) -> Projection;
}

struct FnPredicate<F> {
    kind: ArgumentKind,
    f: F,
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Value, &Value, &MatchContext<'_>) -> bool + Send + Sync,
{
    fn argument_kind(&self) -> ArgumentKind {
        self.kind
    }

    fn test(&self, subject: &Value, argument: &Value, cx: &MatchContext<'_>) -> bool {
        (self.f)(subject, argument, cx)
    }
}

struct FnTransform<F>(F);

impl<F> Transform for FnTransform<F>
where
    F: Fn(&Value, &Value, &MatchContext<'_>) -> Projection + Send + Sync,
{
    fn apply(&self, subject: &Value, options: &Value, cx: &MatchContext<'_>) -> Projection {
        (self.0)(subject, options, cx)
    }
}

fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if name.len() > 1 && name.starts_with(OPERATOR_SIGIL) {
        Ok(())
    } else {
        Err(Error::InvalidOperatorName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Name → operator tables.
#[derive(Clone, Default)]
pub struct Registry {
    predicates: AHashMap<String, Arc<dyn Predicate>>,
    transforms: AHashMap<String, Arc<dyn Transform>>,
}

impl Registry {
    /// A registry with no operators at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        crate::predicates::install(&mut registry);
        crate::transforms::install(&mut registry);
        tracing::debug!(
            predicates = registry.predicates.len(),
            transforms = registry.transforms.len(),
            "Built-in operators installed"
        );
        registry
    }

    pub fn register_predicate<P>(&mut self, name: &str, predicate: P) -> Result<&mut Self>
    where
        P: Predicate + 'static,
    {
        validate_name("Predicate", name)?;
        tracing::debug!(name, "Registering predicate");
        self.predicates.insert(name.to_string(), Arc::new(predicate));
        Ok(self)
    }

    pub fn register_predicate_fn<F>(
        &mut self,
        name: &str,
        kind: ArgumentKind,
        f: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Value, &Value, &MatchContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.register_predicate(name, FnPredicate { kind, f })
    }

    pub fn register_transform<T>(&mut self, name: &str, transform: T) -> Result<&mut Self>
    where
        T: Transform + 'static,
    {
        validate_name("Transform", name)?;
        tracing::debug!(name, "Registering transform");
        self.transforms.insert(name.to_string(), Arc::new(transform));
        Ok(self)
    }

    pub fn register_transform_fn<F>(&mut self, name: &str, f: F) -> Result<&mut Self>
    where
        F: Fn(&Value, &Value, &MatchContext<'_>) -> Projection + Send + Sync + 'static,
    {
        self.register_transform(name, FnTransform(f))
    }

    pub(crate) fn install_predicate<F>(&mut self, name: &'static str, kind: ArgumentKind, f: F)
    where
        F: Fn(&Value, &Value, &MatchContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.predicates
            .insert(name.to_string(), Arc::new(FnPredicate { kind, f }));
    }

    pub(crate) fn install_transform<F>(&mut self, name: &'static str, f: F)
    where
        F: Fn(&Value, &Value, &MatchContext<'_>) -> Projection + Send + Sync + 'static,
    {
        self.transforms
            .insert(name.to_string(), Arc::new(FnTransform(f)));
    }

    pub fn predicate(&self, name: &str) -> Option<&Arc<dyn Predicate>> {
        self.predicates.get(name)
    }

    pub fn transform(&self, name: &str) -> Option<&Arc<dyn Transform>> {
        self.transforms.get(name)
    }

    pub fn is_operator(&self, name: &str) -> bool {
        self.predicates.contains_key(name) || self.transforms.contains_key(name)
    }

    pub fn predicate_names(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    pub fn transform_names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }
}

static GLOBAL: Lazy<RwLock<Arc<Registry>>> =
    Lazy::new(|| RwLock::new(Arc::new(Registry::with_builtins())));

/// Snapshot of the process-wide registry.
pub fn global() -> Arc<Registry> {
    GLOBAL.read().clone()
}

/// Add (or replace) a predicate in the process-wide registry.
///
/// Engines created afterwards see it; engines already running keep their snapshot.
pub fn register_predicate<F>(name: &str, kind: ArgumentKind, f: F) -> Result<()>
where
    F: Fn(&Value, &Value, &MatchContext<'_>) -> bool + Send + Sync + 'static,
{
    let mut guard = GLOBAL.write();
    Arc::make_mut(&mut *guard).register_predicate_fn(name, kind, f)?;
    Ok(())
}

/// Add (or replace) a transform in the process-wide registry.
pub fn register_transform<F>(name: &str, f: F) -> Result<()>
where
    F: Fn(&Value, &Value, &MatchContext<'_>) -> Projection + Send + Sync + 'static,
{
    let mut guard = GLOBAL.write();
    Arc::make_mut(&mut *guard).register_transform_fn(name, f)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_names_without_sigil() {
        let err = register_predicate("isBig", ArgumentKind::Typed, |_, _, _| true).unwrap_err();
        assert!(matches!(err, Error::InvalidOperatorName { kind: "Predicate", .. }));

        let err = register_transform("$", |_, _, _| Projection::Unchanged).unwrap_err();
        assert!(matches!(err, Error::InvalidOperatorName { kind: "Transform", .. }));
    }

    #[test]
    fn test_global_registration_is_visible_to_new_snapshots() {
        let before = global();
        register_predicate("$registryProbe", ArgumentKind::FlagOnly, |_, _, _| true).unwrap();
        assert!(before.predicate("$registryProbe").is_none());
        assert!(global().predicate("$registryProbe").is_some());
    }

    #[test]
    fn test_builtins_present() {
        let registry = Registry::with_builtins();
        assert!(registry.predicate("$eq").is_some());
        assert!(registry.transform("$sum").is_some());
        assert!(registry.is_operator("$elemMatch"));
        assert!(!registry.is_operator("$nope"));
        assert_eq!(
            registry.predicate("$isEven").map(|p| p.argument_kind()),
            Some(ArgumentKind::FlagOnly)
        );
    }

    #[test]
    fn test_local_registry_extension() {
        let mut registry = Registry::empty();
        registry
            .register_predicate_fn("$short", ArgumentKind::Typed, |s, a, _| {
                match (s.as_str(), a.as_f64()) {
                    (Some(s), Some(max)) => (s.chars().count() as f64) < max,
                    _ => false,
                }
            })
            .unwrap();
        assert!(registry.predicate("$short").is_some());
        assert!(registry.transform("$short").is_none());
    }
}
