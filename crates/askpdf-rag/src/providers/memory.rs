//! In-memory index backend and a catalog of named indexes

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::vector_store::{IndexBackend, IndexMatch, IndexRecord, IndexSpec};
use crate::error::{Error, Result};
use crate::types::SparseVector;

/// Brute-force hybrid index held in memory
///
/// Writes are serialized by an internal lock, so concurrent ingests from
/// several requests interleave safely.
pub struct MemoryIndex {
    spec: IndexSpec,
    records: RwLock<Vec<IndexRecord>>,
}

impl MemoryIndex {
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            records: RwLock::new(Vec::new()),
        }
    }

    fn check_dense(&self, dense: &[f32]) -> std::result::Result<(), String> {
        if dense.len() != self.spec.dimensions {
            return Err(format!(
                "vector has {} dimensions, index '{}' expects {}",
                dense.len(),
                self.spec.name,
                self.spec.dimensions
            ));
        }
        if dense.iter().any(|x| !x.is_finite()) {
            return Err("vector contains non-finite values".to_string());
        }
        Ok(())
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Inner product of the L2-normalized vectors; zero vectors score 0
pub fn normalized_dot(a: &[f32], b: &[f32]) -> f32 {
    let (na, nb) = (l2_norm(a), l2_norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / (na * nb)
}

#[async_trait]
impl IndexBackend for MemoryIndex {
    /// Append a record; stored records are never mutated
    async fn upsert(&self, record: IndexRecord) -> Result<()> {
        self.check_dense(&record.dense_vector)
            .map_err(Error::index_ingest)?;

        self.records.write().push(record);
        Ok(())
    }

    /// Store all records or none of them
    async fn upsert_batch(&self, records: Vec<IndexRecord>) -> Result<()> {
        for (i, record) in records.iter().enumerate() {
            self.check_dense(&record.dense_vector).map_err(|e| {
                Error::index_ingest(format!("record {} of {}: {}", i + 1, records.len(), e))
            })?;
        }

        self.records.write().extend(records);
        Ok(())
    }

    async fn query(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        alpha: f32,
        top_k: usize,
    ) -> Result<Vec<IndexMatch>> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::retrieval(format!("alpha {} outside [0, 1]", alpha)));
        }
        self.check_dense(dense).map_err(Error::retrieval)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read();
        let mut scored: Vec<(usize, f32)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let dense_sim = normalized_dot(dense, &r.dense_vector);
                let sparse_sim = sparse.dot(&r.sparse_weights);
                (i, alpha * dense_sim + (1.0 - alpha) * sparse_sim)
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| IndexMatch {
                record: records[i].clone(),
                score,
            })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Named indexes, created on first use
#[derive(Default)]
pub struct IndexCatalog {
    indexes: RwLock<HashMap<String, Arc<MemoryIndex>>>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing index called `name`, or a new dot-product index with
    /// `dimensions`
    pub fn open_or_create(&self, name: &str, dimensions: usize) -> Result<Arc<MemoryIndex>> {
        let mut indexes = self.indexes.write();
        if let Some(index) = indexes.get(name) {
            if index.spec().dimensions != dimensions {
                return Err(Error::Config(format!(
                    "index '{}' exists with {} dimensions, requested {}",
                    name,
                    index.spec().dimensions,
                    dimensions
                )));
            }
            return Ok(Arc::clone(index));
        }

        tracing::info!("Creating index '{}' ({} dims, dotproduct)", name, dimensions);
        let index = Arc::new(MemoryIndex::new(IndexSpec::new(name, dimensions)));
        indexes.insert(name.to_string(), Arc::clone(&index));
        Ok(index)
    }

    /// Names of all created indexes
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn record(text: &str, dense: Vec<f32>, sparse: &[(u32, f32)]) -> IndexRecord {
        let chunk = Chunk::new("doc", 0, text.to_string())
            .with_vectors(dense, SparseVector::from_pairs(sparse.iter().copied()));
        IndexRecord::from_chunk(&chunk)
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = MemoryIndex::new(IndexSpec::new("t", 2));
        let hits = index
            .query(&[1.0, 0.0], &SparseVector::default(), 0.5, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimensions() {
        let index = MemoryIndex::new(IndexSpec::new("t", 3));
        let err = index
            .upsert(record("x", vec![1.0, 0.0], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexIngestFailed(_)));

        let err = index
            .query(&[1.0], &SparseVector::default(), 1.0, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetrievalUnavailable(_)));
    }

    #[tokio::test]
    async fn test_convex_blend() {
        let index = MemoryIndex::new(IndexSpec::new("t", 2));
        // dense favours "a", sparse favours "b"
        index.upsert(record("a", vec![1.0, 0.0], &[(1, 0.1)])).await.unwrap();
        index.upsert(record("b", vec![0.0, 1.0], &[(1, 0.9)])).await.unwrap();
        let q_sparse = SparseVector::from_pairs([(1, 1.0)]);

        let dense_only = index.query(&[1.0, 0.0], &q_sparse, 1.0, 2).await.unwrap();
        assert_eq!(dense_only[0].record.metadata.text, "a");
        assert!((dense_only[0].score - 1.0).abs() < 1e-6);

        let sparse_only = index.query(&[1.0, 0.0], &q_sparse, 0.0, 2).await.unwrap();
        assert_eq!(sparse_only[0].record.metadata.text, "b");
        assert!((sparse_only[0].score - 0.9).abs() < 1e-6);

        let half = index.query(&[1.0, 0.0], &q_sparse, 0.5, 2).await.unwrap();
        assert!((half[0].score - 0.55).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = MemoryIndex::new(IndexSpec::new("t", 2));
        for text in ["first", "second", "third"] {
            index.upsert(record(text, vec![1.0, 1.0], &[])).await.unwrap();
        }

        let hits = index
            .query(&[1.0, 1.0], &SparseVector::default(), 1.0, 2)
            .await
            .unwrap();
        let texts: Vec<_> = hits.iter().map(|h| h.record.metadata.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_same_chunk_twice_is_two_records() {
        let index = MemoryIndex::new(IndexSpec::new("t", 2));
        let chunk = Chunk::new("doc", 0, "dup".to_string())
            .with_vectors(vec![1.0, 0.0], SparseVector::default());

        index.upsert(IndexRecord::from_chunk(&chunk)).await.unwrap();
        index.upsert(IndexRecord::from_chunk(&chunk)).await.unwrap();

        assert_eq!(index.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_batch_with_bad_record_stores_nothing() {
        let index = MemoryIndex::new(IndexSpec::new("t", 2));
        index.upsert(record("kept", vec![1.0, 0.0], &[])).await.unwrap();

        let batch = vec![
            record("good", vec![0.0, 1.0], &[]),
            record("bad", vec![f32::NAN, 1.0], &[]),
            record("also good", vec![1.0, 1.0], &[]),
        ];
        let err = index.upsert_batch(batch).await.unwrap_err();
        assert!(matches!(err, Error::IndexIngestFailed(_)));
        assert!(err.to_string().contains("record 2 of 3"));
        assert_eq!(index.len().await.unwrap(), 1);

        let batch = vec![
            record("good", vec![0.0, 1.0], &[]),
            record("also good", vec![1.0, 1.0], &[]),
        ];
        index.upsert_batch(batch).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 3);
    }

    #[test]
    fn test_catalog_reuses_by_name() {
        let catalog = IndexCatalog::new();
        let a = catalog.open_or_create("hybrid-search-rag", 768).unwrap();
        let b = catalog.open_or_create("hybrid-search-rag", 768).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(catalog.open_or_create("hybrid-search-rag", 384).is_err());
        assert_eq!(catalog.names(), vec!["hybrid-search-rag"]);
    }
}
