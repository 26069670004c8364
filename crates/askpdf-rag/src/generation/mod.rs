//! Answer generation: prompt assembly, the RAG chain and the Ollama client

pub mod chain;
pub mod ollama;
pub mod prompt;

pub use chain::{RagChain, Retriever};
pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, FALLBACK_CONTEXT};
