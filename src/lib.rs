//! # Mango
//!
//! An in-process query, transformation and similarity-ranking engine for
//! semi-structured records.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! mango query people.json '{"age": {"$gte": 18}, "name": {"$capitalize": {}}}' --each
//! mango sort people.json '[{"age": "desc"}, "name"]'
//! mango rank documents.json "kimchi stew"
//! ```
//!
//! ### As a library
//!
//! ```rust
//! use mango::prelude::*;
//! use serde_json::json;
//!
//! let people = Value::from(json!([
//!     {"name": "ann", "age": 31},
//!     {"name": "bob", "age": 17}
//! ]));
//! let adults = evaluate_each(&people, &Value::from(json!({"age": {"$gte": 18}}))).unwrap();
//! assert_eq!(adults, Value::from(json!([{"name": "ann", "age": 31}])));
//!
//! let encoder = Encoder::default();
//! let v = encoder.create_embedding("hello world");
//! assert!((similarity(&v, &v, None, None).unwrap() - 1.0).abs() < 1e-5);
//! ```
//!
//! ## Crate Structure
//!
//! - [`mango-core`](mango_core) - Values, pattern evaluation, operator registries, sorting,
//!   the safe filter dialect and the find pipeline
//! - [`mango-similarity`](mango_similarity) - Syllable-hashing embeddings, similarity
//!   scoring and document ranking

pub mod config;

pub use config::MangoConfig;

// Re-export core types
pub use mango_core::{
    evaluate, evaluate_each, find, normalize_filter_query, register_predicate,
    register_transform, sort, sort_by, ArgumentKind, DocumentStore, Engine, Error, FindRequest,
    MatchContext, Projection, Record, Registry, Result, SortCriterion, Value,
};

// Re-export similarity
pub use mango_similarity::{
    effective_length, rank_texts, search_documents, similarity, Embedding, Encoder,
    EncoderConfig, Scorer, SearchBounds, SearchHit, SimilarityConfig, SimilarityError,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        effective_length, evaluate, evaluate_each, find, normalize_filter_query, rank_texts,
        register_predicate, register_transform, search_documents, similarity, sort, sort_by,
        ArgumentKind, DocumentStore, Embedding, Encoder, Engine, FindRequest, MangoConfig,
        MatchContext, Projection, Record, Scorer, SearchBounds, SearchHit, SortCriterion, Value,
    };
}
