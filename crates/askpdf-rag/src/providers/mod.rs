//! Provider abstractions for embeddings, sparse encoding, LLM and index storage
//!
//! Each capability is a trait so the pipeline can run against Ollama, the
//! offline hashing embedder, or test doubles without changes.

pub mod embedding;
pub mod hashing;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod sparse;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use hashing::HashingEmbedder;
pub use llm::{FragmentStream, LlmProvider};
pub use memory::{IndexCatalog, MemoryIndex};
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use sparse::{Bm25Encoder, SparseEncoder};
pub use vector_store::{IndexBackend, IndexMatch, IndexRecord, IndexSpec, Metric};
