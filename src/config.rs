//! Application configuration, read from a JSON file.
//!
//! ```json
//! {
//!     "encoder": { "dimension": 512 },
//!     "similarity": { "query_power": 0.5, "document_power": 0.333 },
//!     "log_level": "debug"
//! }
//! ```
//!
//! Every section is optional.

use anyhow::Context;
use mango_similarity::{Encoder, EncoderConfig, Scorer, SimilarityConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MangoConfig {
    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Overridden by `--log-level` when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl MangoConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn encoder(&self) -> anyhow::Result<Encoder> {
        Encoder::from_config(&self.encoder).context("Invalid encoder configuration")
    }

    pub fn scorer(&self) -> Scorer {
        Scorer::new(self.similarity)
    }
}
