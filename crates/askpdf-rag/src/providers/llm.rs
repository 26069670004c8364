//! LLM provider trait for answer generation

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::error::Result;

/// Finite, forward-only sequence of generated text fragments
///
/// Dropping the stream stops generation on the consumer side.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for prompt-in, text-out generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (mistral, phi3, llama3, ...)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream the completion for a prompt
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream>;

    /// Full completion for a prompt
    ///
    /// Default implementation collects [`LlmProvider::generate_stream`].
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_stream(prompt)
            .await?
            .try_fold(String::new(), |mut answer, fragment| async move {
                answer.push_str(&fragment);
                Ok(answer)
            })
            .await
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
