//! Configuration for the RAG pipeline
//!
//! Values come from [`RagConfig::default`], optionally merged with a TOML file,
//! then overridden by `ASKPDF_*` environment variables and validated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Prefix shared by all environment overrides
pub const ENV_PREFIX: &str = "ASKPDF_";

/// Main RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RagConfig {
    /// Hybrid index configuration
    #[serde(default)]
    pub index: IndexConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Ollama/LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Semantic chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file; missing sections take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `ASKPDF_*` overrides for the recognized options
    ///
    /// Unknown `ASKPDF_*` variables are ignored.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "INDEX_NAME" => self.index.name = value,
                "EMBEDDING_MODEL" => self.embeddings.model = value,
                "GENERATION_MODEL" => self.llm.generate_model = value,
                "LLM_BASE_URL" => self.llm.base_url = value,
                "ALPHA" => self.index.alpha = parse_env(&key, &value)?,
                "TOP_K" => self.index.top_k = parse_env(&key, &value)?,
                "BREAKPOINT_PERCENTILE" => {
                    self.chunking.breakpoint_percentile = parse_env(&key, &value)?
                }
                "CACHE_DIR" => self.chunking.cache_dir = PathBuf::from(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.index.alpha) {
            return Err(Error::Config(format!(
                "index.alpha must be within [0, 1], got {}",
                self.index.alpha
            )));
        }
        if self.index.top_k == 0 {
            return Err(Error::Config("index.top_k must be at least 1".to_string()));
        }
        if self.index.dimensions == 0 {
            return Err(Error::Config(
                "index.dimensions must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.chunking.breakpoint_percentile) {
            return Err(Error::Config(format!(
                "chunking.breakpoint_percentile must be within [0, 100], got {}",
                self.chunking.breakpoint_percentile
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, value)))
}

/// Hybrid index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index name, created on first use
    pub name: String,
    /// Dense vector dimensionality (768 for bge-base / nomic-embed-text)
    pub dimensions: usize,
    /// Blend weight: 1.0 is pure dense retrieval, 0.0 pure sparse
    pub alpha: f32,
    /// Number of chunks retrieved per question
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "hybrid-search-rag".to_string(),
            dimensions: 768,
            alpha: 1.0,
            top_k: 4,
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embeddings`
    #[default]
    Ollama,
    /// Offline feature-hashing embedder
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend serving embeddings
    pub backend: EmbeddingBackend,
    /// Embedding model identifier
    pub model: String,
    /// Texts per embedding batch during ingest
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            batch_size: 32,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Timeout in seconds for non-streaming requests
    pub timeout_secs: u64,
    /// Number of retries for failed non-streaming requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "mistral".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Semantic chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Percentile of adjacent-sentence distances above which a chunk breaks
    pub breakpoint_percentile: f64,
    /// Neighbouring sentences on each side included when embedding a sentence
    pub buffer_size: usize,
    /// Directory holding cached chunk lists
    pub cache_dir: PathBuf,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            breakpoint_percentile: 95.0,
            buffer_size: 1,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("askpdf-rag")
                .join("chunks"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index.dimensions, 768);
        assert_eq!(config.index.alpha, 1.0);
        assert_eq!(config.chunking.breakpoint_percentile, 95.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RagConfig::from_toml_str(
            r#"
            [index]
            alpha = 0.5
            top_k = 8

            [llm]
            generate_model = "phi3"
            "#,
        )
        .unwrap();

        assert_eq!(config.index.alpha, 0.5);
        assert_eq!(config.index.top_k, 8);
        assert_eq!(config.index.name, "hybrid-search-rag");
        assert_eq!(config.llm.generate_model, "phi3");
        assert_eq!(config.embeddings.model, "nomic-embed-text");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RagConfig::default();
        config
            .apply_env_overrides(vars(&[
                ("ASKPDF_INDEX_NAME", "docs"),
                ("ASKPDF_ALPHA", "0.25"),
                ("ASKPDF_TOP_K", "2"),
                ("ASKPDF_BREAKPOINT_PERCENTILE", "90"),
                ("ASKPDF_GENERATION_MODEL", "llama3"),
                ("HOME", "/root"),
            ]))
            .unwrap();

        assert_eq!(config.index.name, "docs");
        assert_eq!(config.index.alpha, 0.25);
        assert_eq!(config.index.top_k, 2);
        assert_eq!(config.chunking.breakpoint_percentile, 90.0);
        assert_eq!(config.llm.generate_model, "llama3");
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = RagConfig::default();
        let err = config
            .apply_env_overrides(vars(&[("ASKPDF_TOP_K", "many")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = RagConfig::default();
        config.index.alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = RagConfig::default();
        config.chunking.breakpoint_percentile = 101.0;
        assert!(config.validate().is_err());

        let mut config = RagConfig::default();
        config.index.top_k = 0;
        assert!(config.validate().is_err());
    }
}
