//! File-backed chunk cache: one JSON record per key

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{snapshot, ChunkCache};
use crate::error::{Error, Result};
use crate::types::Chunk;

/// On-disk record layout
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    key: String,
    written_at: chrono::DateTime<chrono::Utc>,
    chunks: Vec<Chunk>,
}

/// Chunk cache storing `<cache_dir>/<key>.json`
pub struct FileChunkCache {
    cache_dir: PathBuf,
}

impl FileChunkCache {
    /// Create a cache rooted at `cache_dir` (created lazily on first write)
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory holding the cache files
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File path for a key
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced; when that changes the
    /// key a hash suffix keeps distinct keys in distinct files.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let file_stem = if sanitized == key && !key.starts_with('.') {
            sanitized
        } else {
            let digest = Sha256::digest(key.as_bytes());
            format!("{}-{}", sanitized, &hex::encode(digest)[..12])
        };

        self.cache_dir.join(format!("{}.json", file_stem))
    }

    fn read_record(path: &Path, key: &str) -> Option<Vec<Chunk>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Chunk cache unreadable at {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheRecord>(&bytes) {
            Ok(record) if record.key == key => Some(record.chunks),
            Ok(record) => {
                tracing::warn!(
                    "Chunk cache file {} belongs to key '{}', not '{}'",
                    path.display(),
                    record.key,
                    key
                );
                None
            }
            Err(e) => {
                tracing::warn!("Corrupt chunk cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn write_record(dir: &Path, path: &Path, record: &CacheRecord) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, record)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl ChunkCache for FileChunkCache {
    async fn get(&self, key: &str) -> Option<Vec<Chunk>> {
        let path = self.path_for(key);
        let key = key.to_string();

        match tokio::task::spawn_blocking(move || Self::read_record(&path, &key)).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("Chunk cache read task failed: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &str, chunks: &[Chunk]) -> Result<()> {
        let dir = self.cache_dir.clone();
        let path = self.path_for(key);
        let record = CacheRecord {
            key: key.to_string(),
            written_at: chrono::Utc::now(),
            chunks: snapshot(chunks),
        };

        tokio::task::spawn_blocking(move || Self::write_record(&dir, &path, &record))
            .await
            .map_err(|e| Error::cache(key, format!("Task join error: {}", e)))?
            .map_err(|e| Error::cache(key, e.to_string()))?;

        tracing::debug!("Cached {} chunks under '{}'", chunks.len(), key);
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
