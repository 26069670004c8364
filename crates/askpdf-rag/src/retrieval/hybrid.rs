//! Hybrid index: dense embeddings and BM25 weights blended at query time

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::Retriever;
use crate::providers::{EmbeddingProvider, IndexBackend, IndexRecord, SparseEncoder};
use crate::types::{Chunk, RetrievalResult, ScoredChunk};

const DEFAULT_BATCH_SIZE: usize = 32;

/// Computes both representations for chunks and questions and delegates
/// storage and scoring to an [`IndexBackend`]
pub struct HybridIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    sparse: Arc<dyn SparseEncoder>,
    backend: Arc<dyn IndexBackend>,
    /// 1.0 is dense only, 0.0 is sparse only
    alpha: f32,
    /// Texts per embedding request during ingest
    batch_size: usize,
}

impl HybridIndex {
    /// Create a hybrid index; the embedder must match the backend's dimensions
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        sparse: Arc<dyn SparseEncoder>,
        backend: Arc<dyn IndexBackend>,
        alpha: f32,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Config(format!("alpha {} outside [0, 1]", alpha)));
        }
        if embedder.dimensions() != backend.spec().dimensions {
            return Err(Error::Config(format!(
                "embedder '{}' produces {} dimensions, index '{}' expects {}",
                embedder.name(),
                embedder.dimensions(),
                backend.spec().name,
                backend.spec().dimensions
            )));
        }

        Ok(Self {
            embedder,
            sparse,
            backend,
            alpha,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Set how many chunk texts are embedded per request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Number of stored records
    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.backend.is_empty().await
    }

    /// Vectorize and store chunks; every call adds new records
    ///
    /// Returns the number of records written.
    pub async fn ingest(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut dense = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self
                .embedder
                .embed_batch(batch)
                .await
                .map_err(|e| Error::index_ingest(e.to_string()))?;
            dense.extend(vectors);
        }
        if dense.len() != chunks.len() {
            return Err(Error::index_ingest(format!(
                "embedder returned {} vectors for {} chunks",
                dense.len(),
                chunks.len()
            )));
        }

        // Documents are weighted against the statistics before this batch
        let mut records = Vec::with_capacity(chunks.len());
        for (chunk, dense_vector) in chunks.iter().zip(dense) {
            let sparse_weights = self
                .sparse
                .encode_document(&chunk.text)
                .map_err(|e| Error::index_ingest(e.to_string()))?;
            records.push(IndexRecord::from_chunk(
                &chunk.with_vectors(dense_vector, sparse_weights),
            ));
        }

        self.backend
            .upsert_batch(records)
            .await
            .map_err(|e| match e {
                Error::IndexIngestFailed(_) => e,
                other => Error::index_ingest(other.to_string()),
            })?;
        self.sparse.observe(&texts);

        tracing::info!(
            "Indexed {} chunks into '{}' ({})",
            chunks.len(),
            self.backend.spec().name,
            self.backend.name()
        );
        Ok(chunks.len())
    }

    /// Top-k chunks for a question, descending by blended score
    pub async fn query(&self, question: &str, top_k: usize) -> Result<RetrievalResult> {
        if top_k == 0 || self.backend.is_empty().await.map_err(as_retrieval_error)? {
            return Ok(Vec::new());
        }

        let dense = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| Error::retrieval(e.to_string()))?;
        let sparse = self
            .sparse
            .encode_query(question)
            .map_err(|e| Error::retrieval(e.to_string()))?;

        let matches = self
            .backend
            .query(&dense, &sparse, self.alpha, top_k)
            .await
            .map_err(as_retrieval_error)?;

        tracing::debug!(
            "Query matched {} records (alpha {}, top_k {})",
            matches.len(),
            self.alpha,
            top_k
        );

        Ok(matches
            .into_iter()
            .map(|m| ScoredChunk {
                chunk: m.record.to_chunk(),
                score: m.score,
            })
            .collect())
    }
}

fn as_retrieval_error(e: Error) -> Error {
    match e {
        Error::RetrievalUnavailable(_) => e,
        other => Error::retrieval(other.to_string()),
    }
}

#[async_trait]
impl Retriever for HybridIndex {
    async fn retrieve(&self, question: &str, top_k: usize) -> Result<RetrievalResult> {
        self.query(question, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Bm25Encoder, HashingEmbedder, IndexSpec, MemoryIndex};

    /// Knows that "feline" means "cat"; BM25 does not
    struct SynonymEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SynonymEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let count = |words: &[&str]| {
                words.iter().map(|w| lower.matches(w).count()).sum::<usize>() as f32
            };
            Ok(vec![
                count(&["cat", "feline"]),
                count(&["museum", "picture"]),
                0.1,
            ])
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "synonym"
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::embedding("model not loaded"))
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    /// Produces a NaN component for texts containing "bad"
    struct PoisonEmbedder;

    #[async_trait]
    impl EmbeddingProvider for PoisonEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("bad") {
                Ok(vec![f32::NAN, 1.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "poison"
        }
    }

    fn index_with(embedder: Arc<dyn EmbeddingProvider>, alpha: f32) -> HybridIndex {
        let dims = embedder.dimensions();
        HybridIndex::new(
            embedder,
            Arc::new(Bm25Encoder::default()),
            Arc::new(MemoryIndex::new(IndexSpec::new("test", dims))),
            alpha,
        )
        .unwrap()
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new("doc.md", i, t.to_string()))
            .collect()
    }

    const CORPUS: &[&str] = &[
        "The feline rested on the mat.",
        "A cat picture hangs in the cat museum next to another cat picture.",
    ];

    #[tokio::test]
    async fn test_alpha_one_ranks_by_dense() {
        let index = index_with(Arc::new(SynonymEmbedder), 1.0);
        index.ingest(&chunks(CORPUS)).await.unwrap();

        let results = index.query("cat", 2).await.unwrap();
        assert_eq!(results[0].chunk.text, CORPUS[0]);
    }

    #[tokio::test]
    async fn test_alpha_zero_ranks_by_sparse() {
        let index = index_with(Arc::new(SynonymEmbedder), 0.0);
        index.ingest(&chunks(CORPUS)).await.unwrap();

        let results = index.query("cat", 2).await.unwrap();
        assert_eq!(results[0].chunk.text, CORPUS[1]);
        assert_eq!(results[1].score, 0.0);
    }

    #[tokio::test]
    async fn test_results_bounded_and_sorted() {
        let index = index_with(Arc::new(HashingEmbedder::new(64)), 0.5).with_batch_size(2);
        let texts = [
            "Rust has ownership and borrowing.",
            "Tokio is an async runtime for Rust.",
            "Bread needs flour, water and yeast.",
            "The borrow checker enforces ownership rules.",
            "Sourdough bread uses a starter.",
        ];
        assert_eq!(index.ingest(&chunks(&texts)).await.unwrap(), 5);

        let results = index.query("How does Rust ownership work?", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(results[0].chunk.text.contains("ownership"));

        assert!(index.query("anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let index = index_with(Arc::new(BrokenEmbedder), 0.5);
        assert!(index.query("question", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reingest_adds_records() {
        let index = index_with(Arc::new(HashingEmbedder::new(16)), 0.5);
        let batch = chunks(&["Same text."]);
        index.ingest(&batch).await.unwrap();
        index.ingest(&batch).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_maps_to_ingest_error() {
        let index = index_with(Arc::new(BrokenEmbedder), 0.5);
        let err = index.ingest(&chunks(&["text"])).await.unwrap_err();
        assert!(matches!(err, Error::IndexIngestFailed(_)));
        assert!(index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_batch_leaves_index_and_stats_untouched() {
        let bm25 = Arc::new(Bm25Encoder::default());
        let index = HybridIndex::new(
            Arc::new(PoisonEmbedder),
            bm25.clone(),
            Arc::new(MemoryIndex::new(IndexSpec::new("test", 2))),
            0.5,
        )
        .unwrap();

        let err = index
            .ingest(&chunks(&["good one", "bad two"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexIngestFailed(_)));
        assert_eq!(index.len().await.unwrap(), 0);
        assert_eq!(bm25.corpus_size(), 0);
        assert!(index.query("good", 4).await.unwrap().is_empty());

        index.ingest(&chunks(&["good one"])).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
        assert_eq!(bm25.corpus_size(), 1);
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        let result = HybridIndex::new(
            Arc::new(HashingEmbedder::new(8)),
            Arc::new(Bm25Encoder::default()),
            Arc::new(MemoryIndex::new(IndexSpec::new("t", 768))),
            1.0,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
