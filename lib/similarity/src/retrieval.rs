//! Ranking documents against a query embedding.

use crate::encoder::{is_number, tokenize, Encoder};
use crate::error::Result;
use crate::scorer::Scorer;
use crate::vector::Embedding;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Length used for the similarity penalty: numbers count their digits, other
/// tokens their characters. Whitespace is not counted.
pub fn effective_length(text: &str) -> usize {
    tokenize(text)
        .map(|token| {
            if is_number(token) {
                token.bytes().filter(u8::is_ascii_digit).count()
            } else {
                token.chars().count()
            }
        })
        .sum()
}

/// Inclusive score window for [`search_documents`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBounds {
    #[serde(default)]
    pub lower: f32,
    #[serde(default = "default_upper")]
    pub upper: f32,
}

fn default_upper() -> f32 {
    1.0
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: default_upper(),
        }
    }
}

impl SearchBounds {
    /// `score >= lower`, with scores above 1 treated as 1 against `upper`.
    pub fn contains(&self, score: f32) -> bool {
        score >= self.lower && score.min(1.0) <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Position of the document in the input.
    pub index: usize,
    pub similarity: f32,
}

fn by_score(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then(a.index.cmp(&b.index))
}

/// Score every document against `query` without a length penalty and return the
/// hits inside `bounds`, best first.
pub fn search_documents(
    scorer: &Scorer,
    query: &Embedding,
    documents: &[Embedding],
    bounds: SearchBounds,
) -> Result<Vec<SearchHit>> {
    let scored = documents
        .par_iter()
        .enumerate()
        .map(|(index, document)| {
            scorer
                .similarity(query, document, None, None, true)
                .map(|similarity| SearchHit { index, similarity })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut hits: Vec<SearchHit> = scored
        .into_iter()
        .filter(|hit| bounds.contains(hit.similarity))
        .collect();
    hits.sort_by(by_score);
    tracing::debug!(
        documents = documents.len(),
        hits = hits.len(),
        "Document search complete"
    );
    Ok(hits)
}

/// Embed `query` and `texts`, then score each text with the effective-length
/// penalty in the query direction. Every text is returned, best first.
pub fn rank_texts<S: AsRef<str> + Sync>(
    encoder: &Encoder,
    scorer: &Scorer,
    query: &str,
    texts: &[S],
) -> Result<Vec<SearchHit>> {
    let query_embedding = encoder.create_embedding(query);
    let query_len = effective_length(query);

    let mut hits = texts
        .par_iter()
        .enumerate()
        .map(|(index, text)| {
            let text = text.as_ref();
            let embedding = encoder.create_embedding(text);
            scorer
                .similarity(
                    &query_embedding,
                    &embedding,
                    Some(query_len),
                    Some(effective_length(text)),
                    true,
                )
                .map(|similarity| SearchHit { index, similarity })
        })
        .collect::<Result<Vec<_>>>()?;
    hits.sort_by(by_score);
    Ok(hits)
}
