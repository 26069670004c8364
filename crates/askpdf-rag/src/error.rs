//! Error types for the RAG pipeline

use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document could not be converted to text
    #[error("Failed to extract text from '{filename}': {message}")]
    ExtractionFailed { filename: String, message: String },

    /// Embedding capability failed while computing breakpoints
    #[error("Chunking failed: {0}")]
    ChunkingFailed(String),

    /// Index backend rejected an upsert
    #[error("Index ingest failed: {0}")]
    IndexIngestFailed(String),

    /// Index backend could not answer a query
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Generation capability failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Embedding request error (raised by embedding providers)
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Chunk cache could not be persisted
    #[error("Chunk cache error for key '{key}': {message}")]
    Cache { key: String, message: String },

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a chunking error
    pub fn chunking(message: impl Into<String>) -> Self {
        Self::ChunkingFailed(message.into())
    }

    /// Create an index ingest error
    pub fn index_ingest(message: impl Into<String>) -> Self {
        Self::IndexIngestFailed(message.into())
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationFailed(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a cache error
    pub fn cache(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cache {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the chain recovers from this error locally
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RetrievalUnavailable(_))
    }
}
