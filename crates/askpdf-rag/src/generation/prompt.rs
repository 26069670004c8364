//! Prompt templates for RAG generation

use crate::types::ScoredChunk;

/// Context substituted when retrieval fails or finds nothing
pub const FALLBACK_CONTEXT: &str = "No relevant context found.";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from retrieved chunks, in rank order
    ///
    /// Returns [`FALLBACK_CONTEXT`] when there is nothing to show.
    pub fn build_context(results: &[ScoredChunk]) -> String {
        if results.is_empty() {
            return FALLBACK_CONTEXT.to_string();
        }

        results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the full RAG prompt
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are an intelligent assistant designed to provide accurate and concise answers based on the given context. Follow these guidelines strictly:
1. Use only the information provided in the context to answer the question.
2. If the context does not contain enough information to answer the question, respond with "I don't know."
3. Ensure your answer is directly relevant to the question and avoids unnecessary details.
4. Do not mention that the answer is derived from the context.
5. Please ensure that your answer is organized and easy to follow. Use headings, bullet points, numbered lists, and clear sections to structure your response.

### Question: {question}

### Context: {context}

### Answer:"#,
            question = question.trim(),
            context = context,
        )
    }
}
