//! Index backend trait for storing and scoring hybrid records

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Chunk, SparseVector};

/// Similarity metric an index is created with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Inner product; dense vectors are L2-normalized before scoring
    #[default]
    DotProduct,
}

/// Fixed properties of an index, set at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimensions: usize,
    pub metric: Metric,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions,
            metric: Metric::DotProduct,
        }
    }
}

/// Chunk fields stored alongside the vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
}

/// One stored entry; never mutated after insertion
#[derive(Debug, Clone)]
pub struct IndexRecord {
    /// Unique per ingest call, so re-ingesting a chunk adds a second record
    pub record_id: Uuid,
    /// ID of the chunk the vectors were computed from
    pub chunk_id: Uuid,
    pub dense_vector: Vec<f32>,
    pub sparse_weights: SparseVector,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    /// Build a record from a vectorized chunk; the index keeps its own copy
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            chunk_id: chunk.id,
            dense_vector: chunk.dense_vector.clone(),
            sparse_weights: chunk.sparse_weights.clone(),
            metadata: RecordMetadata {
                document_id: chunk.source_document_id.clone(),
                sequence_index: chunk.sequence_index,
                text: chunk.text.clone(),
            },
        }
    }

    /// Rebuild the chunk this record was created from
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            id: self.chunk_id,
            source_document_id: self.metadata.document_id.clone(),
            sequence_index: self.metadata.sequence_index,
            text: self.metadata.text.clone(),
            dense_vector: self.dense_vector.clone(),
            sparse_weights: self.sparse_weights.clone(),
        }
    }
}

/// Scored record returned by a backend query
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub record: IndexRecord,
    pub score: f32,
}

/// Trait for hybrid dense+sparse index storage
///
/// Implementations:
/// - `MemoryIndex`: in-process, brute-force scoring
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Store a record
    async fn upsert(&self, record: IndexRecord) -> Result<()>;

    /// Store multiple records (batch)
    ///
    /// The default stops at the first rejected record and keeps the ones
    /// before it. Backends that can validate up front should override this
    /// to store all records or none.
    async fn upsert_batch(&self, records: Vec<IndexRecord>) -> Result<()> {
        for record in records {
            self.upsert(record).await?;
        }
        Ok(())
    }

    /// Top-k records by `alpha * dense + (1 - alpha) * sparse`, ties in
    /// insertion order
    async fn query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        alpha: f32,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>>;

    /// Get total number of records stored
    async fn len(&self) -> Result<usize>;

    /// Check if index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Creation-time properties
    fn spec(&self) -> &IndexSpec;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
