//! Semantic chunking: split where adjacent sentences drift apart in meaning
//!
//! Every sentence is embedded together with its neighbours; a chunk boundary
//! is placed wherever the cosine distance between consecutive windows exceeds
//! the configured percentile of all such distances.

use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use crate::cache::ChunkCache;
use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::providers::memory::normalized_dot;
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

/// Embedding-breakpoint chunker with read-through/write-through caching
pub struct SemanticChunker {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn ChunkCache>,
    /// Percentile (0-100) of the distance distribution used as threshold
    breakpoint_percentile: f64,
    /// Sentences on each side joined into the embedding window
    buffer_size: usize,
}

impl SemanticChunker {
    /// Create a new chunker
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Arc<dyn ChunkCache>,
        config: &ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            cache,
            breakpoint_percentile: config.breakpoint_percentile,
            buffer_size: config.buffer_size,
        }
    }

    /// Chunk a document's text, consulting the cache by `cache_key` first
    ///
    /// A cache hit is returned unmodified without any embedding call. Empty
    /// text yields an empty list and is not cached.
    pub async fn chunk(&self, document_id: &str, text: &str, cache_key: &str) -> Result<Vec<Chunk>> {
        if let Some(cached) = self.cache.get(cache_key).await {
            tracing::debug!("Chunk cache hit for '{}' ({} chunks)", cache_key, cached.len());
            return Ok(cached);
        }
        tracing::debug!("Chunk cache miss for '{}'", cache_key);

        let sentences = split_into_sentences(text);
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let groups = if sentences.len() == 1 {
            vec![sentences]
        } else {
            self.group_sentences(sentences).await?
        };

        let chunks: Vec<Chunk> = groups
            .into_iter()
            .enumerate()
            .map(|(i, group)| Chunk::new(document_id, i, group.join(" ")))
            .collect();

        tracing::info!("Split '{}' into {} semantic chunks", document_id, chunks.len());

        if let Err(e) = self.cache.put(cache_key, &chunks).await {
            tracing::warn!("Could not persist chunks for '{}': {}", cache_key, e);
        }

        Ok(chunks)
    }

    async fn group_sentences<'a>(&self, sentences: Vec<&'a str>) -> Result<Vec<Vec<&'a str>>> {
        let windows = combine_sentences(&sentences, self.buffer_size);
        let embeddings = self
            .embedder
            .embed_batch(&windows)
            .await
            .map_err(|e| Error::chunking(e.to_string()))?;

        if embeddings.len() != windows.len() {
            return Err(Error::chunking(format!(
                "embedder returned {} vectors for {} sentences",
                embeddings.len(),
                windows.len()
            )));
        }

        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - normalized_dot(&pair[0], &pair[1]) as f64)
            .collect();
        let threshold = percentile(&distances, self.breakpoint_percentile);
        tracing::debug!(
            "Breakpoint threshold {:.4} at p{} over {} distances",
            threshold,
            self.breakpoint_percentile,
            distances.len()
        );

        let mut groups = Vec::new();
        let mut current = Vec::new();
        for (i, sentence) in sentences.into_iter().enumerate() {
            current.push(sentence);
            if distances.get(i).is_some_and(|d| *d > threshold) {
                groups.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }
        Ok(groups)
    }
}

/// Sentence units by Unicode sentence boundaries, trimmed, blanks dropped
pub fn split_into_sentences(text: &str) -> Vec<&str> {
    text.split_sentence_bounds()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Each sentence joined with up to `buffer_size` neighbours on either side
fn combine_sentences(sentences: &[&str], buffer_size: usize) -> Vec<String> {
    (0..sentences.len())
        .map(|i| {
            let start = i.saturating_sub(buffer_size);
            let end = (i + buffer_size + 1).min(sentences.len());
            sentences[start..end].join(" ")
        })
        .collect()
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
