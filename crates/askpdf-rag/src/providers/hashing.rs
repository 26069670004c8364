//! Offline embedding provider based on feature hashing
//!
//! Each token is hashed into one of `dimensions` buckets with a hashed sign;
//! the bag is L2-normalized. No model download, fully deterministic, and texts
//! sharing vocabulary land close together.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::embedding::EmbeddingProvider;
use super::sparse::tokenize;
use crate::error::{Error, Result};

/// Deterministic bag-of-words embedder
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimensions`-long vectors
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Synchronous embedding used by the async trait method
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        if self.dimensions == 0 {
            return Vec::new();
        }
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_be_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimensions;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(Error::embedding("hashing embedder has zero dimensions"));
        }
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
