//! # Mango Similarity
//!
//! Deterministic text embeddings and length-aware similarity scoring.
//!
//! Embeddings are not learned: text is rewritten as Hangul syllables and the
//! syllable codes are feature-hashed into a fixed-length, L2-normalized vector.
//! Vectors from encoders with different dimensions are not comparable.
//!
//! ## Example
//!
//! ```rust
//! use mango_similarity::{similarity, Encoder};
//!
//! let encoder = Encoder::new(512).unwrap();
//! let a = encoder.create_embedding("hello world test");
//! let b = encoder.create_embedding("hello world other");
//!
//! let cross = similarity(&a, &b, None, None).unwrap();
//! let own = similarity(&a, &a, None, None).unwrap();
//! assert!(cross > 0.0 && cross < own);
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! text ─> tokens ─> syllables ─> codes ─> hashed counts ─> L2 normalize
//!                                                              │
//!                         query ──────> Scorer (dot × length penalty)
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod retrieval;
pub mod scorer;
pub mod tables;
pub mod vector;

pub use config::{EncoderConfig, SimilarityConfig};
pub use encoder::{to_sino_korean, tokenize, Encoder};
pub use error::{Result, SimilarityError};
pub use retrieval::{effective_length, rank_texts, search_documents, SearchBounds, SearchHit};
pub use scorer::{similarity, Scorer};
pub use vector::Embedding;
