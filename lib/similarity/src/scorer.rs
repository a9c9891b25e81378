//! Length-aware similarity between embeddings.

use crate::config::SimilarityConfig;
use crate::error::Result;
use crate::vector::Embedding;

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    config: SimilarityConfig,
}

impl Scorer {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Dot product of `a` and `b`, scaled by `(min/max)^power` of the source text
    /// lengths when both are known and non-zero.
    ///
    /// The stricter `query_power` applies when `a` is the shorter text and
    /// `query_direction` is set; `document_power` applies otherwise. With equal
    /// lengths the score is symmetric.
    pub fn similarity(
        &self,
        a: &Embedding,
        b: &Embedding,
        len_a: Option<usize>,
        len_b: Option<usize>,
        query_direction: bool,
    ) -> Result<f32> {
        let base = a.dot(b)?;
        let (len_a, len_b) = match (len_a, len_b) {
            (Some(x), Some(y)) if x > 0 && y > 0 => (x, y),
            _ => return Ok(base),
        };
        let ratio = len_a.min(len_b) as f32 / len_a.max(len_b) as f32;
        let power = if len_a < len_b && query_direction {
            self.config.query_power
        } else {
            self.config.document_power
        };
        Ok(base * ratio.powf(power))
    }
}

/// [`Scorer::similarity`] with default powers, scored in the query direction.
pub fn similarity(
    a: &Embedding,
    b: &Embedding,
    len_a: Option<usize>,
    len_b: Option<usize>,
) -> Result<f32> {
    Scorer::default().similarity(a, b, len_a, len_b, true)
}
