//! Document and chunk types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sparse::SparseVector;

/// A contiguous passage of a document, the unit of retrieval
///
/// Vectors are never persisted with the chunk: they are recomputed from `text`
/// whenever the chunk is ingested into an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Identifier of the document this chunk was cut from
    pub source_document_id: String,
    /// Position in the original document (0-based)
    pub sequence_index: usize,
    /// Chunk text, never empty
    pub text: String,
    /// Dense embedding (empty until ingested)
    #[serde(skip)]
    pub dense_vector: Vec<f32>,
    /// Sparse term weights (empty until ingested)
    #[serde(skip)]
    pub sparse_weights: SparseVector,
}

impl Chunk {
    /// Create a new chunk without vectors
    pub fn new(source_document_id: impl Into<String>, sequence_index: usize, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_document_id: source_document_id.into(),
            sequence_index,
            text,
            dense_vector: Vec::new(),
            sparse_weights: SparseVector::default(),
        }
    }

    /// Copy of this chunk carrying freshly computed vectors
    pub fn with_vectors(&self, dense_vector: Vec<f32>, sparse_weights: SparseVector) -> Self {
        Self {
            dense_vector,
            sparse_weights,
            ..self.clone()
        }
    }

    /// Whether both representations have been computed
    pub fn is_vectorized(&self) -> bool {
        !self.dense_vector.is_empty()
    }
}

/// Equality ignores vectors, which are derived data
impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.source_document_id == other.source_document_id
            && self.sequence_index == other.sequence_index
            && self.text == other.text
    }
}

/// A document that has been extracted and chunked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier (the uploaded file name)
    pub document_id: String,
    /// Extracted markdown text
    pub raw_text: String,
    /// Ordered chunks
    pub chunks: Vec<Chunk>,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a document from its extracted text and chunks
    pub fn new(document_id: impl Into<String>, raw_text: String, chunks: Vec<Chunk>) -> Self {
        Self {
            document_id: document_id.into(),
            raw_text,
            chunks,
            created_at: chrono::Utc::now(),
        }
    }

    /// All chunk texts joined by paragraph breaks
    pub fn content(&self) -> String {
        self.chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
