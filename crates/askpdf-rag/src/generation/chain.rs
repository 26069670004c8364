//! Question answering over a retriever and an LLM

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{FragmentStream, LlmProvider};
use crate::types::RetrievalResult;

use super::prompt::{PromptBuilder, FALLBACK_CONTEXT};

/// Anything that can rank chunks for a question
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `top_k` chunks, best first
    async fn retrieve(&self, question: &str, top_k: usize) -> Result<RetrievalResult>;
}

/// Retrieve, format, generate
///
/// Retrieval problems never surface to the caller: the chain answers from
/// [`FALLBACK_CONTEXT`] instead. Generation problems do.
pub struct RagChain {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
}

impl RagChain {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LlmProvider>, top_k: usize) -> Self {
        Self { retriever, llm, top_k }
    }

    /// Context string for a question, falling back on any retrieval error
    pub async fn retrieve_context(&self, question: &str) -> String {
        match self.retriever.retrieve(question, self.top_k).await {
            Ok(results) => {
                tracing::debug!("Retrieved {} chunks for question", results.len());
                PromptBuilder::build_context(&results)
            }
            Err(e) => {
                tracing::warn!("Retrieval failed, answering without context: {}", e);
                FALLBACK_CONTEXT.to_string()
            }
        }
    }

    /// The exact prompt that would be sent for `question`
    pub async fn prompt_for(&self, question: &str) -> String {
        let context = self.retrieve_context(question).await;
        PromptBuilder::build_rag_prompt(question, &context)
    }

    /// Complete answer text
    pub async fn answer(&self, question: &str) -> Result<String> {
        let prompt = self.prompt_for(question).await;
        tracing::info!("Generating answer with {} ({})", self.llm.name(), self.llm.model());

        self.llm.generate(&prompt).await.map_err(into_generation_error)
    }

    /// Answer delivered as fragments whose concatenation is the full answer
    pub async fn answer_stream(&self, question: &str) -> Result<FragmentStream> {
        let prompt = self.prompt_for(question).await;
        tracing::info!("Streaming answer with {} ({})", self.llm.name(), self.llm.model());

        let stream = self
            .llm
            .generate_stream(&prompt)
            .await
            .map_err(into_generation_error)?;
        Ok(stream.map_err(into_generation_error).boxed())
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

fn into_generation_error(e: Error) -> Error {
    match e {
        Error::GenerationFailed(_) => e,
        other => Error::generation(other.to_string()),
    }
}
