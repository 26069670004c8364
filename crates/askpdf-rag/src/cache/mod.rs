//! Chunk cache: persisted chunk lists keyed by document identifier
//!
//! A miss is a normal value (`None`), never an error. Writes are
//! last-write-wins and durable before `put` returns.

mod file;
mod memory;

pub use file::FileChunkCache;
pub use memory::MemoryChunkCache;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::Result;
use crate::types::Chunk;

/// Key-value persistence for chunk lists
#[async_trait]
pub trait ChunkCache: Send + Sync {
    /// Previously stored chunk list, `None` when never written or unreadable
    async fn get(&self, key: &str) -> Option<Vec<Chunk>>;

    /// Store a chunk list, replacing any previous value for `key`
    async fn put(&self, key: &str, chunks: &[Chunk]) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Cache key derived from an uploaded file name: `<stem>_chunks`
pub fn key_for_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    format!("{}_chunks", stem)
}

/// Cache key derived from the document text itself
///
/// Unlike [`key_for_filename`], re-uploading changed content under the same
/// file name produces a different key.
pub fn key_for_content(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256-{}", hex::encode(hasher.finalize()))
}

/// Chunks as persisted: vectors dropped, everything else intact
fn snapshot(chunks: &[Chunk]) -> Vec<Chunk> {
    chunks
        .iter()
        .map(|c| Chunk {
            dense_vector: Vec::new(),
            sparse_weights: Default::default(),
            ..c.clone()
        })
        .collect()
}
