//! Retrieval result types

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// A retrieved chunk with its blended relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The matched chunk
    pub chunk: Chunk,
    /// `alpha * dense + (1 - alpha) * sparse`, higher is more relevant
    pub score: f32,
}

/// Ranked chunks, descending by score, at most `top_k` long
pub type RetrievalResult = Vec<ScoredChunk>;
