//! kbfuse - hybrid semantic retrieval engine
//!
//! Turns raw text into dual (dense + sparse) vector representations, persists
//! them alongside their source documents, and answers top-k similarity queries
//! by fusing the two ranking signals into one ordered result list:
//! - Chunk splitting with a recursive separator hierarchy and overlap
//! - Encoder adapters behind `DenseEncoder` / `SparseEncoder` contracts
//! - An `EmbeddingStore` with atomic per-chunk writes and fused search
//!   (Postgres/pgvector or in-memory backends)
//! - An ingestion pipeline and a hybrid retriever composed on top
//!
//! Document loaders, model backends, and any HTTP/CLI surface live outside
//! this crate behind the collaborator contracts.

pub mod chunker;
pub mod config;
pub mod db;
pub mod encoders;
pub mod errors;
pub mod ingest;
pub mod metrics;
pub mod retriever;
pub mod sparse;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use encoders::{DenseEncoder, EncoderSet, SparseEncoder};
pub use errors::{EngineError, Result};
pub use ingest::IngestionPipeline;
pub use retriever::HybridRetriever;
pub use sparse::SparseVector;
pub use store::{DocumentMetadata, EmbeddingStore, SearchResult};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default dense embedding model
pub const DEFAULT_DENSE_MODEL: &str = "nomic-ai/nomic-embed-text-v1";

/// Default dense embedding dimension
pub const DEFAULT_DENSE_DIMENSION: usize = 768;

/// Default sparse embedding model
pub const DEFAULT_SPARSE_MODEL: &str = "naver/splade-cocondenser-ensembledistil";

/// Default sparse vocabulary size
pub const DEFAULT_SPARSE_VOCAB_SIZE: usize = 30522;
