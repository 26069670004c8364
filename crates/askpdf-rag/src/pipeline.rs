//! End-to-end document pipeline
//!
//! Upload → extract → chunk (cache first) → index → ready, then question
//! answering against the shared index.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::cache::{key_for_filename, FileChunkCache};
use crate::config::{EmbeddingBackend, RagConfig};
use crate::error::{Error, Result};
use crate::generation::RagChain;
use crate::ingestion::{DocumentExtractor, FileExtractor, SemanticChunker};
use crate::providers::{
    Bm25Encoder, EmbeddingProvider, FragmentStream, HashingEmbedder, IndexCatalog, LlmProvider,
    OllamaProvider,
};
use crate::retrieval::HybridIndex;
use crate::session::{ProcessedDocument, Session};
use crate::types::Document;

/// Ingestion progress of one document
///
/// `Ready` and `Failed` are terminal. A later ingestion of the same
/// identifier starts again at `Uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestState {
    Uploaded,
    Extracted,
    Chunked,
    Indexed,
    Ready,
    Failed,
}

impl IngestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// Outcome of a successful ingestion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub state: IngestState,
    pub chunk_count: usize,
    /// True when the session already had the document and nothing ran
    pub skipped: bool,
}

enum Source<'a> {
    File(&'a Path),
    Text(&'a str),
}

/// Extractor, chunker, hybrid index and RAG chain wired together
pub struct DocumentPipeline {
    extractor: Arc<dyn DocumentExtractor>,
    chunker: SemanticChunker,
    index: Arc<HybridIndex>,
    chain: RagChain,
}

impl DocumentPipeline {
    /// Create a pipeline from its parts; the chain retrieves from `index`
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        chunker: SemanticChunker,
        index: Arc<HybridIndex>,
        llm: Arc<dyn LlmProvider>,
        top_k: usize,
    ) -> Self {
        let chain = RagChain::new(index.clone(), llm, top_k);
        Self {
            extractor,
            chunker,
            index,
            chain,
        }
    }

    /// Build the default stack: Ollama generation, the configured embedder,
    /// BM25, a catalog index and the on-disk chunk cache
    ///
    /// Generation (and Ollama embeddings, when configured) go through
    /// `ollama`, so callers can health-check the same client.
    pub fn from_config(
        config: &RagConfig,
        catalog: &IndexCatalog,
        ollama: &OllamaProvider,
    ) -> Result<Self> {
        config.validate()?;

        let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.backend {
            EmbeddingBackend::Ollama => ollama.embedder(),
            EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::new(config.index.dimensions)),
        };
        let llm: Arc<dyn LlmProvider> = ollama.llm();

        let backend = catalog.open_or_create(&config.index.name, config.index.dimensions)?;
        let index = HybridIndex::new(
            Arc::clone(&embedder),
            Arc::new(Bm25Encoder::default()),
            backend,
            config.index.alpha,
        )?
        .with_batch_size(config.embeddings.batch_size);

        let cache = Arc::new(FileChunkCache::new(config.chunking.cache_dir.clone()));
        let chunker = SemanticChunker::new(embedder.clone(), cache, &config.chunking);

        tracing::info!(
            "Pipeline ready: index '{}', embedder {}, generator {} ({})",
            config.index.name,
            embedder.name(),
            llm.name(),
            llm.model()
        );

        Ok(Self::new(
            Arc::new(FileExtractor::new()),
            chunker,
            Arc::new(index),
            llm,
            config.index.top_k,
        ))
    }

    /// Shared hybrid index
    pub fn index(&self) -> &HybridIndex {
        &self.index
    }

    /// Ingest an uploaded file, keyed by its file name
    pub async fn ingest_file(&self, session: &mut Session, path: &Path) -> Result<IngestReport> {
        let document_id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::extraction(path.display().to_string(), "path has no file name"))?;

        self.ingest(session, &document_id, Source::File(path)).await
    }

    /// Ingest already extracted text under `document_id`
    pub async fn ingest_text(
        &self,
        session: &mut Session,
        document_id: &str,
        text: &str,
    ) -> Result<IngestReport> {
        self.ingest(session, document_id, Source::Text(text)).await
    }

    async fn ingest(
        &self,
        session: &mut Session,
        document_id: &str,
        source: Source<'_>,
    ) -> Result<IngestReport> {
        if let Some(done) = session.document(document_id) {
            tracing::debug!("'{}' already processed in this session", document_id);
            let chunk_count = done.document.chunks.len();
            session.select(document_id);
            return Ok(IngestReport {
                document_id: document_id.to_string(),
                state: IngestState::Ready,
                chunk_count,
                skipped: true,
            });
        }

        session.set_state(document_id, IngestState::Uploaded);
        match self.run_stages(session, document_id, source).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Ingestion of '{}' failed: {}", document_id, e);
                session.set_state(document_id, IngestState::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        session: &mut Session,
        document_id: &str,
        source: Source<'_>,
    ) -> Result<IngestReport> {
        let text = match source {
            Source::File(path) => self.extractor.extract(path).await?,
            Source::Text(text) => text.to_string(),
        };
        session.set_state(document_id, IngestState::Extracted);

        let cache_key = key_for_filename(document_id);
        let chunks = self.chunker.chunk(document_id, &text, &cache_key).await?;
        session.set_state(document_id, IngestState::Chunked);

        self.index.ingest(&chunks).await?;
        session.set_state(document_id, IngestState::Indexed);

        let chunk_count = chunks.len();
        session.record_document(ProcessedDocument::new(Document::new(
            document_id,
            text,
            chunks,
        )));
        session.set_state(document_id, IngestState::Ready);
        tracing::info!("'{}' ready ({} chunks)", document_id, chunk_count);

        Ok(IngestReport {
            document_id: document_id.to_string(),
            state: IngestState::Ready,
            chunk_count,
            skipped: false,
        })
    }

    /// Answer a question and append the exchange to the session history
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<String> {
        let answer = self.chain.answer(question).await?;
        session.record_exchange(question, answer.clone());
        Ok(answer)
    }

    /// Stream an answer; the caller records the exchange once consumed
    pub async fn ask_stream(&self, question: &str) -> Result<FragmentStream> {
        self.chain.answer_stream(question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryChunkCache;
    use crate::config::ChunkingConfig;
    use crate::providers::{IndexSpec, MemoryIndex};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
            let answer = format!("{} chars", prompt.len());
            Ok(futures::stream::iter(vec![Ok(answer)]).boxed())
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl DocumentExtractor for FailingExtractor {
        async fn extract(&self, path: &Path) -> Result<String> {
            Err(Error::extraction(path.display().to_string(), "encrypted"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Hashing embedder whose first `failures` calls error out
    struct FlakyEmbedder {
        inner: HashingEmbedder,
        failures: AtomicUsize,
    }

    impl FlakyEmbedder {
        fn failing(failures: usize) -> Self {
            Self {
                inner: HashingEmbedder::new(32),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let remaining = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if remaining.is_ok() {
                return Err(Error::embedding("connection refused"));
            }
            Ok(self.inner.embed_sync(text))
        }

        fn dimensions(&self) -> usize {
            32
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    const NOTES: &str = "Rust has ownership. Tokio runs async tasks. Bread needs yeast.";

    fn pipeline(extractor: Arc<dyn DocumentExtractor>) -> DocumentPipeline {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(32));
        pipeline_with(extractor, embedder.clone(), embedder)
    }

    fn pipeline_with(
        extractor: Arc<dyn DocumentExtractor>,
        chunk_embedder: Arc<dyn EmbeddingProvider>,
        index_embedder: Arc<dyn EmbeddingProvider>,
    ) -> DocumentPipeline {
        let index = HybridIndex::new(
            index_embedder,
            Arc::new(Bm25Encoder::default()),
            Arc::new(MemoryIndex::new(IndexSpec::new("test", 32))),
            0.5,
        )
        .unwrap();
        let chunker = SemanticChunker::new(
            chunk_embedder,
            Arc::new(MemoryChunkCache::new()),
            &ChunkingConfig::default(),
        );
        DocumentPipeline::new(extractor, chunker, Arc::new(index), Arc::new(EchoLlm), 4)
    }

    #[tokio::test]
    async fn test_ingest_text_reaches_ready() {
        let pipeline = pipeline(Arc::new(FileExtractor::new()));
        let mut session = Session::new();

        let report = pipeline
            .ingest_text(&mut session, "notes.md", "First point. Second point.")
            .await
            .unwrap();

        assert_eq!(report.state, IngestState::Ready);
        assert!(!report.skipped);
        assert!(report.chunk_count >= 1);
        assert_eq!(session.ingest_state("notes.md"), Some(IngestState::Ready));
        assert_eq!(pipeline.index().len().await.unwrap(), report.chunk_count);
    }

    #[tokio::test]
    async fn test_second_ingest_in_session_is_skipped() {
        let pipeline = pipeline(Arc::new(FileExtractor::new()));
        let mut session = Session::new();

        pipeline.ingest_text(&mut session, "a.md", "Alpha. Beta.").await.unwrap();
        let indexed = pipeline.index().len().await.unwrap();
        let again = pipeline.ingest_text(&mut session, "a.md", "Alpha. Beta.").await.unwrap();

        assert!(again.skipped);
        assert_eq!(pipeline.index().len().await.unwrap(), indexed);
    }

    #[tokio::test]
    async fn test_extraction_failure_marks_failed() {
        let pipeline = pipeline(Arc::new(FailingExtractor));
        let mut session = Session::new();

        let err = pipeline
            .ingest_file(&mut session, Path::new("/tmp/secret.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ExtractionFailed { .. }));
        assert_eq!(session.ingest_state("secret.pdf"), Some(IngestState::Failed));
        assert!(session.document("secret.pdf").is_none());
        assert!(IngestState::Failed.is_terminal());
    }

    #[tokio::test]
    async fn test_chunking_failure_marks_failed() {
        let pipeline = pipeline_with(
            Arc::new(FileExtractor::new()),
            Arc::new(FlakyEmbedder::failing(usize::MAX)),
            Arc::new(HashingEmbedder::new(32)),
        );
        let mut session = Session::new();

        let err = pipeline
            .ingest_text(&mut session, "notes.md", NOTES)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ChunkingFailed(_)));
        assert_eq!(session.ingest_state("notes.md"), Some(IngestState::Failed));
        assert!(session.document("notes.md").is_none());
        assert!(pipeline.index().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_index_failure_marks_failed() {
        let pipeline = pipeline_with(
            Arc::new(FileExtractor::new()),
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(FlakyEmbedder::failing(usize::MAX)),
        );
        let mut session = Session::new();

        let err = pipeline
            .ingest_text(&mut session, "notes.md", NOTES)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::IndexIngestFailed(_)));
        assert_eq!(session.ingest_state("notes.md"), Some(IngestState::Failed));
        assert!(session.document("notes.md").is_none());
        assert!(session.current_document().is_none());
    }

    #[tokio::test]
    async fn test_retry_after_failure_reaches_ready() {
        let pipeline = pipeline_with(
            Arc::new(FileExtractor::new()),
            Arc::new(FlakyEmbedder::failing(1)),
            Arc::new(HashingEmbedder::new(32)),
        );
        let mut session = Session::new();

        pipeline
            .ingest_text(&mut session, "notes.md", NOTES)
            .await
            .unwrap_err();
        assert_eq!(session.ingest_state("notes.md"), Some(IngestState::Failed));

        let report = pipeline
            .ingest_text(&mut session, "notes.md", NOTES)
            .await
            .unwrap();

        assert!(!report.skipped);
        assert_eq!(report.state, IngestState::Ready);
        assert_eq!(session.ingest_state("notes.md"), Some(IngestState::Ready));
        let done = session.document("notes.md").unwrap();
        assert_eq!(done.document.chunks.len(), report.chunk_count);
        assert_eq!(pipeline.index().len().await.unwrap(), report.chunk_count);
    }

    #[tokio::test]
    async fn test_from_config_uses_given_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.index.dimensions = 32;
        config.embeddings.backend = EmbeddingBackend::Hashing;
        config.chunking.cache_dir = dir.path().to_path_buf();

        let ollama =
            OllamaProvider::new(&config.llm, &config.embeddings, &config.index).unwrap();
        let llm_refs = Arc::strong_count(&ollama.llm());
        let catalog = IndexCatalog::new();
        let pipeline = DocumentPipeline::from_config(&config, &catalog, &ollama).unwrap();

        assert_eq!(Arc::strong_count(&ollama.llm()), llm_refs + 1);
        assert_eq!(catalog.names(), vec![config.index.name.clone()]);

        let mut session = Session::new();
        let report = pipeline
            .ingest_text(&mut session, "notes.md", NOTES)
            .await
            .unwrap();
        assert_eq!(report.state, IngestState::Ready);
    }

    #[tokio::test]
    async fn test_ask_records_history() {
        let pipeline = pipeline(Arc::new(FileExtractor::new()));
        let mut session = Session::new();

        let answer = pipeline.ask(&mut session, "Anything?").await.unwrap();

        assert!(answer.ends_with("chars"));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].content, answer);
    }
}
