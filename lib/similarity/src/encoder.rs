//! Syllable-hashing text encoder.
//!
//! Text is rewritten as a sequence of Hangul syllables (Hangul passes through,
//! numbers are read out in Sino-Korean, everything else is romanized through
//! the jamo tables), each syllable becomes its offset in the syllable block, and
//! the offsets are hashed into a fixed-length vector which is then L2-normalized.

use crate::config::EncoderConfig;
use crate::error::{Result, SimilarityError};
use crate::tables::{self, EXTENDED_DIMENSION};
use crate::vector::Embedding;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]*\.[0-9]+|[0-9]+|\S+").unwrap());
static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").unwrap());

/// Split on whitespace, keeping decimal numbers as single tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    TOKEN.find_iter(text).map(|m| m.as_str())
}

/// Code emitted between words; a space falls outside the syllable block.
pub const WORD_BREAK: u32 = 0;

pub(crate) fn is_number(token: &str) -> bool {
    NUMBER.is_match(token)
}

/// Hangul syllables block, including the unassigned tail up to U+D7AF.
fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7AF}').contains(&c)
}

/// Offset of a syllable in the block, or 0 outside the assigned range.
fn syllable_offset(code: u32) -> u32 {
    if (tables::SYLLABLE_BASE..=tables::SYLLABLE_LAST).contains(&code) {
        code - tables::SYLLABLE_BASE
    } else {
        0
    }
}

/// Read a non-negative integer, given as decimal digits, in Sino-Korean.
pub fn to_sino_korean(digits: &str) -> String {
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return tables::SINO_KOREAN_DIGITS[0].to_string();
    }
    let mut out = String::new();
    for (i, d) in digits.bytes().enumerate() {
        let digit = usize::from(d - b'0');
        if digit == 0 {
            continue;
        }
        out.push(tables::SINO_KOREAN_DIGITS[digit]);
        if let Some(place) = tables::place_name(digits.len() - i) {
            out.push_str(place);
        }
    }
    out
}

type ClusterTable = AHashMap<&'static str, u32>;

fn table(base: &[(&'static str, u32)], extended: &[(&'static str, u32)], extend: bool) -> ClusterTable {
    let mut map: ClusterTable = base.iter().copied().collect();
    if extend {
        map.extend(extended.iter().copied());
    }
    map
}

/// Longest match of at most `max_len` characters at the start of `rest`.
fn match_cluster(table: &ClusterTable, rest: &[char], max_len: usize) -> Option<(u32, usize)> {
    let mut key = String::with_capacity(max_len * 4);
    (1..=max_len.min(rest.len())).rev().find_map(|len| {
        key.clear();
        key.extend(&rest[..len]);
        table.get(key.as_str()).map(|&code| (code, len))
    })
}

#[derive(Debug, Clone)]
pub struct Encoder {
    dimension: usize,
    initials: ClusterTable,
    vowels: ClusterTable,
    finals: ClusterTable,
    consonant_len: usize,
    vowel_len: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::build(EncoderConfig::default().dimension)
    }
}

impl Encoder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(SimilarityError::InvalidDimension(dimension));
        }
        Ok(Self::build(dimension))
    }

    pub fn from_config(config: &EncoderConfig) -> Result<Self> {
        Self::new(config.dimension)
    }

    fn build(dimension: usize) -> Self {
        let extended = dimension >= EXTENDED_DIMENSION;
        tracing::debug!(dimension, extended, "Creating embedding encoder");
        Self {
            dimension,
            initials: table(tables::INITIALS, tables::EXTENDED_INITIALS, extended),
            vowels: table(tables::VOWELS, tables::EXTENDED_VOWELS, extended),
            finals: table(tables::FINALS, tables::EXTENDED_FINALS, extended),
            consonant_len: if extended { 3 } else { 2 },
            vowel_len: if extended { 4 } else { 3 },
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_extended(&self) -> bool {
        self.dimension >= EXTENDED_DIMENSION
    }

    /// Encode `text`. The same text always yields the same vector for a given dimension.
    pub fn create_embedding(&self, text: &str) -> Embedding {
        let codes = self.syllable_codes(text);
        tracing::trace!(syllables = codes.len(), "Encoding text");
        self.hash_codes(&codes)
    }

    /// Syllable-block offsets for every syllable in `text`, in order. Words are
    /// separated by [`WORD_BREAK`]; leading and trailing breaks are dropped.
    pub fn syllable_codes(&self, text: &str) -> Vec<u32> {
        let words: Vec<Vec<u32>> = tokenize(text).map(|token| self.token_codes(token)).collect();
        let Some(first) = words.iter().position(|w| !w.is_empty()) else {
            return Vec::new();
        };
        let last = words.iter().rposition(|w| !w.is_empty()).unwrap_or(first);
        words[first..=last].join(&[WORD_BREAK][..])
    }

    fn token_codes(&self, token: &str) -> Vec<u32> {
        let mut codes = Vec::new();
        if token.chars().all(is_hangul) {
            codes.extend(token.chars().map(|c| syllable_offset(u32::from(c))));
        } else if is_number(token) {
            let (whole, fraction) = token.split_once('.').unwrap_or((token, ""));
            let mut spoken = to_sino_korean(whole);
            if !fraction.is_empty() {
                spoken.push(tables::DECIMAL_POINT);
                spoken.extend(
                    fraction
                        .bytes()
                        .map(|d| tables::SINO_KOREAN_DIGITS[usize::from(d - b'0')]),
                );
            }
            codes.extend(spoken.chars().map(|c| syllable_offset(u32::from(c))));
        } else {
            self.compose(&romanize(token), &mut codes);
        }
        codes
    }

    /// Greedily split romanized text into initial/vowel/final clusters.
    fn compose(&self, text: &str, codes: &mut Vec<u32>) {
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let (initial, used) = match_cluster(&self.initials, &chars[i..], self.consonant_len)
                .unwrap_or((tables::SILENT_INITIAL, 0));
            i += used;

            let Some((vowel, used)) = match_cluster(&self.vowels, &chars[i..], self.vowel_len)
            else {
                i += 1;
                continue;
            };
            i += used;

            let final_offset = match match_cluster(&self.finals, &chars[i..], self.consonant_len) {
                Some((code, used)) => {
                    i += used;
                    code - tables::FINAL_BASE
                }
                None => 0,
            };

            let code = tables::SYLLABLE_BASE
                + (initial - tables::INITIAL_BASE) * 588
                + (vowel - tables::VOWEL_BASE) * 28
                + final_offset;
            codes.push(syllable_offset(code));
        }
    }

    fn hash_codes(&self, codes: &[u32]) -> Embedding {
        let dim = self.dimension;

        let mut counts: Vec<(u32, f32)> = Vec::new();
        let mut slots: AHashMap<u32, usize> = AHashMap::new();
        for &code in codes {
            let slot = *slots.entry(code).or_insert_with(|| {
                counts.push((code, 0.0));
                counts.len() - 1
            });
            counts[slot].1 += 1.0;
        }

        let mut spread: Vec<(usize, f32)> = vec![(dim / 3, 0.5), (2 * dim / 3, 0.25)];
        if self.is_extended() {
            spread.push((dim / 4, 0.125));
            spread.push((3 * dim / 4, 0.0625));
        }

        let mut embedding = Embedding::zeros(dim);
        let data = embedding.as_mut_slice();
        for (code, freq) in counts {
            let primary = code as usize % dim;
            data[primary] += freq;
            for &(offset, weight) in &spread {
                data[(primary + offset) % dim] += freq * weight;
            }
        }
        embedding.normalize();
        embedding
    }
}

/// Lowercase `token`, spelling out symbols and naming characters outside ASCII.
fn romanize(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if let Some(word) = tables::phonetic_equivalent(c) {
            out.push_str(word);
        } else if is_hangul(c) || c.is_ascii_alphanumeric() || c.is_whitespace() {
            out.push(c);
        } else {
            match unicode_names2::name(c) {
                Some(name) => out.push_str(&name.to_string()),
                None => out.push(c),
            }
        }
    }
    out.to_lowercase()
}
