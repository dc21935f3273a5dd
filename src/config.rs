//! Configuration management
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/<env>.toml)
//! - Default values

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Result;
use crate::{
    DEFAULT_DENSE_DIMENSION, DEFAULT_DENSE_MODEL, DEFAULT_SPARSE_MODEL, DEFAULT_SPARSE_VOCAB_SIZE,
};

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding inference server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Dense model identifier
    #[serde(default = "default_dense_model")]
    pub dense_model: String,

    /// Dense embedding dimension
    #[serde(default = "default_dense_dimension")]
    pub dense_dimension: usize,

    /// Sparse model identifier
    #[serde(default = "default_sparse_model")]
    pub sparse_model: String,

    /// Sparse vocabulary size
    #[serde(default = "default_sparse_vocab_size")]
    pub sparse_vocab_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// How many chunks are encoded concurrently during ingestion
    #[serde(default = "default_encode_concurrency")]
    pub encode_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Dense/sparse blend weight: 1.0 is pure dense, 0.0 is pure sparse.
    /// The 0.6 default biases toward semantic similarity while still
    /// surfacing exact-term sparse matches.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Default number of results returned by the retriever
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

// Default value functions
fn default_max_connections() -> u32 {
    50
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_endpoint() -> String {
    "http://localhost:8100".to_string()
}
fn default_dense_model() -> String {
    DEFAULT_DENSE_MODEL.to_string()
}
fn default_dense_dimension() -> usize {
    DEFAULT_DENSE_DIMENSION
}
fn default_sparse_model() -> String {
    DEFAULT_SPARSE_MODEL.to_string()
}
fn default_sparse_vocab_size() -> usize {
    DEFAULT_SPARSE_VOCAB_SIZE
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_encode_concurrency() -> usize {
    4
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_alpha() -> f64 {
    0.6
}
fn default_top_k() -> usize {
    4
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            dense_model: default_dense_model(),
            dense_dimension: default_dense_dimension(),
            sparse_model: default_sparse_model(),
            sparse_vocab_size: default_sparse_vocab_size(),
            timeout_secs: default_embedding_timeout(),
            encode_concurrency: default_encode_concurrency(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            top_k: default_top_k(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. APP__EMBEDDING__DENSE_DIMENSION=768
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Embedding request timeout as Duration
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    /// The read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database
            .read_url
            .as_deref()
            .unwrap_or(&self.database.url)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/kbfuse".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}
