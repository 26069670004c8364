//! In-process chunk cache

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{snapshot, ChunkCache};
use crate::error::Result;
use crate::types::Chunk;

/// Chunk cache held in memory for the lifetime of the process
#[derive(Default)]
pub struct MemoryChunkCache {
    entries: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl MemoryChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ChunkCache for MemoryChunkCache {
    async fn get(&self, key: &str) -> Option<Vec<Chunk>> {
        self.entries.read().get(key).cloned()
    }

    async fn put(&self, key: &str, chunks: &[Chunk]) -> Result<()> {
        self.entries.write().insert(key.to_string(), snapshot(chunks));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
