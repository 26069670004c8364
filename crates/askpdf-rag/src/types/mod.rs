//! Core types for documents, chunks and retrieval results

pub mod document;
pub mod response;
pub mod sparse;

pub use document::{Chunk, Document};
pub use response::{RetrievalResult, ScoredChunk};
pub use sparse::SparseVector;
