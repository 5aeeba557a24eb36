use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters of overlap between consecutive chunks. Must be strictly
    /// smaller than `chunk_size`.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector dimensionality; every stored vector is validated
    /// against this.
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_endpoint() -> String {
    "http://localhost:8080/v1".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    /// Base URL of the document parser service.
    #[serde(default = "default_parser_endpoint")]
    pub endpoint: String,
    /// Parsing can be slow for large scanned documents.
    #[serde(default = "default_parser_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            endpoint: default_parser_endpoint(),
            timeout_secs: default_parser_timeout_secs(),
        }
    }
}

fn default_parser_endpoint() -> String {
    "http://localhost:8001".to_string()
}
fn default_parser_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `ollama` or `openai` (any OpenAI-compatible chat endpoint).
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Timeout budget for a single generation call.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3.2".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Hits scoring below this are dropped from the prompt context.
    /// Set to 0.0 to disable filtering.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f64 {
    0.25
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("failed to read config file {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Configuration(format!("failed to parse config file: {e}")))?;

    validate(&config)?;
    Ok(config)
}

/// Validate cross-field constraints. Also applied to programmatically
/// constructed configs before the pipeline is assembled.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::Configuration(
            "chunking.chunk_size must be > 0".into(),
        ));
    }

    // Overlap >= chunk size would make the window never advance.
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(Error::Configuration(format!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap, config.chunking.chunk_size
        )));
    }

    if config.embedding.dims == 0 {
        return Err(Error::Configuration("embedding.dims must be > 0".into()));
    }
    if config.embedding.batch_size == 0 {
        return Err(Error::Configuration(
            "embedding.batch_size must be > 0".into(),
        ));
    }

    match config.llm.provider.as_str() {
        "ollama" | "openai" => {}
        other => {
            return Err(Error::Configuration(format!(
                "unknown llm provider: '{other}'. Must be ollama or openai."
            )))
        }
    }

    if config.query.top_k == 0 {
        return Err(Error::Configuration("query.top_k must be >= 1".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            db: DbConfig {
                path: PathBuf::from("/tmp/docdex.db"),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            parser: ParserConfig::default(),
            llm: LlmConfig::default(),
            query: QueryConfig::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = base_config();
        config.chunking.chunk_size = 100;
        config.chunking.overlap = 100;
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        config.chunking.overlap = 150;
        assert!(validate(&config).is_err());

        config.chunking.overlap = 99;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_unknown_llm_provider() {
        let mut config = base_config();
        config.llm.provider = "carrier-pigeon".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [db]
            path = "/tmp/test.db"

            [chunking]
            chunk_size = 400
            overlap = 40
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.embedding.dims, 768);
        assert_eq!(config.query.top_k, 5);
        assert!(validate(&config).is_ok());
    }
}
