//! Ollama HTTP client for embeddings and generation with retry logic

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::FragmentStream;

/// Longest wait between two retries
const MAX_BACKOFF_SECS: u64 = 30;

/// Time allowed to open a connection, for every request including streams
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Whole-request limit for non-streaming calls
    request_timeout: Duration,
    /// Configuration
    config: LlmConfig,
    /// Embedding model name
    embed_model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// One NDJSON line of a streaming `/api/generate` response
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig, embed_model: impl Into<String>) -> Result<Self> {
        // No client-wide timeout: it would also cut off long streamed answers
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            request_timeout: Duration::from_secs(config.timeout_secs),
            config: config.clone(),
            embed_model: embed_model.into(),
        })
    }

    /// Generation model name
    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }

    /// Limit applied to embedding, blocking generation and health requests
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let (client, url, model) = (&self.client, url.as_str(), self.embed_model.as_str());
        let timeout = self.request_timeout;

        self.retry_request(|| async move {
            let request = EmbedRequest {
                model,
                prompt: text,
            };

            let response = client
                .post(url)
                .timeout(timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(Error::embedding(format!(
                    "Embedding failed: HTTP {}",
                    response.status()
                )));
            }

            let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                Error::embedding(format!("Failed to parse embedding response: {}", e))
            })?;

            Ok(embed_response.embedding)
        })
        .await
    }

    /// Generate a full completion with retry
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        tracing::info!("Generating answer with model: {}", self.config.generate_model);

        let (client, url) = (&self.client, url.as_str());
        let (model, temperature) = (self.config.generate_model.as_str(), self.config.temperature);
        let timeout = self.request_timeout;

        self.retry_request(|| async move {
            let request = GenerateRequest {
                model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature },
            };

            let response = client
                .post(url)
                .timeout(timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::generation(format!("Generation request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::generation(format!(
                    "Generation failed: HTTP {} - {}",
                    status, body
                )));
            }

            let generate_response: GenerateResponse = response.json().await.map_err(|e| {
                Error::generation(format!("Failed to parse generation response: {}", e))
            })?;

            Ok(generate_response.response)
        })
        .await
    }

    /// Start a streaming completion
    ///
    /// Streams are not retried: fragments may already have reached the caller.
    /// Only the connect timeout applies; the body may take as long as the
    /// model needs.
    pub async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model: &self.config.generate_model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::generation(format!(
                "Stream failed: HTTP {}",
                response.status()
            )));
        }

        Ok(decode_ndjson(response.bytes_stream()))
    }
}

/// Wait before retry number `attempt + 1`: 1s, 2s, 4s, ... capped at
/// `MAX_BACKOFF_SECS`
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

struct NdjsonState<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

enum Line {
    Fragment(String),
    Skip,
    Done(Option<String>),
    Failed(Error),
}

fn parse_line(line: &[u8]) -> Line {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(e) => return Line::Failed(Error::generation(format!("Invalid UTF-8 in stream: {}", e))),
    };
    if line.is_empty() {
        return Line::Skip;
    }

    match serde_json::from_str::<StreamChunk>(line) {
        Ok(StreamChunk { error: Some(msg), .. }) => Line::Failed(Error::generation(msg)),
        Ok(chunk) if chunk.done => {
            Line::Done(Some(chunk.response).filter(|r| !r.is_empty()))
        }
        Ok(chunk) if chunk.response.is_empty() => Line::Skip,
        Ok(chunk) => Line::Fragment(chunk.response),
        Err(e) => Line::Failed(Error::generation(format!("Malformed stream chunk: {}", e))),
    }
}

/// Turn an NDJSON byte stream into text fragments
///
/// Lines may be split across network chunks; bytes are buffered until a full
/// line is available. The stream ends at the first `done` line, at the end of
/// the body, or after the first error.
pub fn decode_ndjson<S, E>(body: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = NdjsonState {
        body: Box::pin(body),
        buffer: Vec::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                match parse_line(&line) {
                    Line::Fragment(text) => return Some((Ok(text), state)),
                    Line::Skip => continue,
                    Line::Done(last) => {
                        state.finished = true;
                        match last {
                            Some(text) => return Some((Ok(text), state)),
                            None => return None,
                        }
                    }
                    Line::Failed(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::generation(format!("Stream error: {}", e))), state));
                }
                None => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    return match parse_line(&rest) {
                        Line::Fragment(text) | Line::Done(Some(text)) => Some((Ok(text), state)),
                        Line::Failed(e) => Some((Err(e), state)),
                        Line::Skip | Line::Done(None) => None,
                    };
                }
            }
        }
    })
    .boxed()
}
