//! Sparse (lexical) encoders
//!
//! Documents and queries are encoded asymmetrically, BM25 style: document
//! weights carry saturated term frequency with length normalization, query
//! weights carry normalized inverse document frequency. Their dot product is a
//! BM25 score.

use parking_lot::RwLock;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::Result;
use crate::types::SparseVector;

/// Trait for term-weight encoders
pub trait SparseEncoder: Send + Sync {
    /// Encode a passage that will be stored in the index
    fn encode_document(&self, text: &str) -> Result<SparseVector>;

    /// Encode a question used to search the index
    fn encode_query(&self, text: &str) -> Result<SparseVector>;

    /// Update corpus statistics with newly ingested passages
    fn observe(&self, _texts: &[String]) {}

    /// Get encoder name for logging
    fn name(&self) -> &str;
}

/// Average document length assumed before any corpus statistics exist
pub const DEFAULT_AVG_DOC_LEN: f32 = 40.0;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me",
    "more", "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "out", "over", "own", "same", "she", "should", "so", "some",
    "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "you", "your",
];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex"))
}

fn stop_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercased word tokens with stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !stop_words().contains(t))
        .map(str::to_string)
        .collect()
}

/// Stable 32-bit term id
pub fn term_id(token: &str) -> u32 {
    let digest = Sha256::digest(token.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[derive(Debug, Default)]
struct CorpusStats {
    n_docs: usize,
    total_len: usize,
    doc_freq: HashMap<u32, usize>,
}

impl CorpusStats {
    fn avg_doc_len(&self) -> f32 {
        if self.n_docs == 0 {
            DEFAULT_AVG_DOC_LEN
        } else {
            (self.total_len as f32 / self.n_docs as f32).max(1.0)
        }
    }
}

/// BM25 encoder with incrementally learned corpus statistics
pub struct Bm25Encoder {
    k1: f32,
    b: f32,
    stats: RwLock<CorpusStats>,
}

impl Default for Bm25Encoder {
    fn default() -> Self {
        Self::new(1.2, 0.75)
    }
}

impl Bm25Encoder {
    /// Create an encoder with explicit BM25 parameters
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            k1,
            b,
            stats: RwLock::new(CorpusStats::default()),
        }
    }

    /// Learn document frequencies and average length from a corpus
    pub fn fit(&self, corpus: &[String]) {
        self.observe(corpus);
    }

    /// Number of documents seen so far
    pub fn corpus_size(&self) -> usize {
        self.stats.read().n_docs
    }

    fn term_frequencies(text: &str) -> (HashMap<u32, usize>, usize) {
        let tokens = tokenize(text);
        let mut tf = HashMap::new();
        for token in &tokens {
            *tf.entry(term_id(token)).or_insert(0) += 1;
        }
        (tf, tokens.len())
    }
}

impl SparseEncoder for Bm25Encoder {
    fn encode_document(&self, text: &str) -> Result<SparseVector> {
        let (tf, doc_len) = Self::term_frequencies(text);
        let avg = self.stats.read().avg_doc_len();
        let norm = self.k1 * (1.0 - self.b + self.b * doc_len as f32 / avg);

        Ok(SparseVector::from_pairs(tf.into_iter().map(|(id, freq)| {
            let freq = freq as f32;
            (id, freq / (norm + freq))
        })))
    }

    fn encode_query(&self, text: &str) -> Result<SparseVector> {
        let (tf, _) = Self::term_frequencies(text);
        let stats = self.stats.read();
        let n = stats.n_docs as f32;

        let idf: Vec<(u32, f32)> = tf
            .keys()
            .map(|id| {
                let df = stats.doc_freq.get(id).copied().unwrap_or(0) as f32;
                (*id, ((n + 1.0) / (df + 0.5)).ln())
            })
            .collect();
        let total: f32 = idf.iter().map(|(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            return Ok(SparseVector::default());
        }

        Ok(SparseVector::from_pairs(
            idf.into_iter().map(|(id, w)| (id, w / total)),
        ))
    }

    fn observe(&self, texts: &[String]) {
        let mut stats = self.stats.write();
        for text in texts {
            let (tf, len) = Self::term_frequencies(text);
            stats.n_docs += 1;
            stats.total_len += len;
            for id in tf.into_keys() {
                *stats.doc_freq.entry(id).or_insert(0) += 1;
            }
        }
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
