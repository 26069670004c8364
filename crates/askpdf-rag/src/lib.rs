//! askpdf-rag: ask questions about a document
//!
//! Extracted text is split by a semantic chunker (results cached per
//! document), indexed with dense embeddings and BM25 weights, and queried with
//! a convex blend of both scores. A RAG chain turns the top chunks into a
//! grounded prompt and streams the model's answer; when retrieval fails it
//! answers from a fixed fallback context instead of erroring.

pub mod cache;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod session;
pub mod types;

pub use cache::{ChunkCache, FileChunkCache, MemoryChunkCache};
pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::{RagChain, Retriever, FALLBACK_CONTEXT};
pub use ingestion::{DocumentExtractor, FileExtractor, SemanticChunker};
pub use pipeline::{DocumentPipeline, IngestReport, IngestState};
pub use providers::{
    Bm25Encoder, EmbeddingProvider, FragmentStream, HashingEmbedder, IndexCatalog, LlmProvider,
    MemoryIndex, OllamaProvider, SparseEncoder,
};
pub use retrieval::HybridIndex;
pub use session::{ChatMessage, ProcessedDocument, Role, Session};
pub use types::{Chunk, Document, RetrievalResult, ScoredChunk, SparseVector};
