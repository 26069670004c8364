//! Ollama-based providers for embeddings and LLM
//!
//! Wraps the shared OllamaClient to implement the provider traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, IndexConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::generation::OllamaClient;

use super::embedding::EmbeddingProvider;
use super::llm::{FragmentStream, LlmProvider};

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.client.embed(text).await?;
        if embedding.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "model returned {} dimensions, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaLlm {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        let model = client.generate_model().to_string();
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        self.client.generate_stream(prompt).await
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Combined Ollama provider that shares a single client for both embeddings and LLM
pub struct OllamaProvider {
    client: Arc<OllamaClient>,
    embedder: Arc<OllamaEmbedder>,
    llm: Arc<OllamaLlm>,
}

impl OllamaProvider {
    /// Create a new combined Ollama provider
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig, index: &IndexConfig) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(llm, embeddings.model.clone())?);
        Ok(Self {
            embedder: Arc::new(OllamaEmbedder::from_client(
                Arc::clone(&client),
                index.dimensions,
            )),
            llm: Arc::new(OllamaLlm::from_client(Arc::clone(&client))),
            client,
        })
    }

    /// Check if the Ollama server answers
    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    /// Get the embedding provider
    pub fn embedder(&self) -> Arc<OllamaEmbedder> {
        Arc::clone(&self.embedder)
    }

    /// Get the LLM provider
    pub fn llm(&self) -> Arc<OllamaLlm> {
        Arc::clone(&self.llm)
    }
}
