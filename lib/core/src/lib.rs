//! # Mango Core
//!
//! Pattern evaluation over dynamic records.
//!
//! This crate provides:
//!
//! - [`Value`] - Tagged dynamic value (records, arrays, scalars, dates, functions)
//! - [`Engine`] - Evaluates patterns: predicates, transforms and nested sub-patterns
//! - [`Registry`] - `$`-named predicate and transform tables, extensible at runtime
//! - [`sort`] - Multi-key stable sorting with loosely written criteria
//! - [`normalize_filter_query`] - Safe selector dialect for document stores
//!
//! ## Example
//!
//! ```rust
//! use mango_core::{evaluate, Value};
//! use serde_json::json;
//!
//! let record = Value::from(json!({"name": "joe", "age": "20"}));
//! let pattern = Value::from(json!({"age": {"$toNumber": {}}, "name": {"$capitalize": {}}}));
//!
//! let result = evaluate(&record, &pattern).unwrap();
//! assert_eq!(result, Value::from(json!({"name": "Joe", "age": 20})));
//!
//! assert!(evaluate(&record, &Value::from(json!({"age": {"$isEven": true}}))).is_none());
//! ```

pub mod error;
pub mod evaluator;
pub mod expr;
pub mod filter;
pub mod find;
pub mod path;
pub mod predicates;
mod regex_cache;
pub mod registry;
pub mod sort;
pub mod transforms;
pub mod value;

pub use error::{Error, Result};
pub use evaluator::{apply_edits, evaluate, evaluate_each, Edit, Engine, Evaluation};
pub use filter::{normalize_filter_query, Filter, SafeFilter, SAFE_OPERATORS};
pub use find::{find, DocumentStore, FindRequest};
pub use path::expand_dot_path;
pub use registry::{
    register_predicate, register_transform, ArgumentKind, Assignment, EditAction, MatchContext,
    Predicate, Projection, Registry, Transform,
};
pub use sort::{sort, sort_by, Direction, SortCriterion};
pub use value::{Function, Record, Value};
