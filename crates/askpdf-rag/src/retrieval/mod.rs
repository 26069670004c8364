//! Hybrid dense+sparse retrieval over an index backend

mod hybrid;

pub use hybrid::HybridIndex;
