//! Sparse term-weight vectors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from term id to non-negative weight
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector(BTreeMap<u32, f32>);

impl SparseVector {
    /// Build from `(term_id, weight)` pairs, summing repeated ids and dropping
    /// non-positive weights
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, f32)>,
    {
        let mut map = BTreeMap::new();
        for (id, weight) in pairs {
            *map.entry(id).or_insert(0.0) += weight;
        }
        map.retain(|_, w| *w > 0.0);
        Self(map)
    }

    /// Dot product over shared term ids
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (small, large) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        small
            .iter()
            .filter_map(|(id, w)| large.get(id).map(|v| w * v))
            .sum()
    }

    /// Weight of a term, zero when absent
    pub fn get(&self, term_id: u32) -> f32 {
        self.0.get(&term_id).copied().unwrap_or(0.0)
    }

    /// Number of non-zero terms
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(term_id, weight)` in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}
