//! Encoder and scorer configuration.
//!
//! Both structs deserialize from partial JSON; missing fields take the defaults below.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Embedding length. Values of 512 and above enable the larger cluster tables.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_dimension() -> usize {
    512
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

/// Exponents of the length penalty `(min/max)^power`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimilarityConfig {
    /// Used when a shorter query is scored against a longer document.
    #[serde(default = "default_query_power")]
    pub query_power: f32,

    /// Used in every other case.
    #[serde(default = "default_document_power")]
    pub document_power: f32,
}

fn default_query_power() -> f32 {
    0.5
}

fn default_document_power() -> f32 {
    0.333
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            query_power: default_query_power(),
            document_power: default_document_power(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let encoder: EncoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(encoder, EncoderConfig::default());

        let scorer: SimilarityConfig = serde_json::from_str(r#"{"query_power": 0.75}"#).unwrap();
        assert_eq!(scorer.query_power, 0.75);
        assert_eq!(scorer.document_power, 0.333);
    }
}
