//! Embedding store
//!
//! Owns the knowledge-base, document, and embedding records and their
//! relationships. Two backends share one contract and one set of observable
//! semantics:
//! - [`PgEmbeddingStore`]: Postgres + pgvector, scoring inside the database
//! - [`MemoryStore`]: in-process maps, used by tests and offline development
//!
//! Every insert is atomic across the document row and both embedding rows; a
//! document is never observable without its two embeddings.

mod fusion;
mod memory;
mod postgres;

pub use fusion::fuse_scores;
pub use memory::MemoryStore;
pub use postgres::PgEmbeddingStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EngineError, Result, VectorKind};
use crate::sparse::SparseVector;

/// A logical collection scoping documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Typed chunk metadata. The source-document identifier and file name are
/// always present; `chunk_index`/`total_chunks` are stamped by ingestion;
/// anything genuinely free-form rides in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_document_id: Uuid,
    pub file_name: String,
    pub chunk_index: i32,
    pub total_chunks: i32,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A persisted document (chunk record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub knowledge_base_id: Option<i64>,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub created_at: DateTime<Utc>,
}

/// One fused-search hit; produced only as a query response value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: i64,
    /// `alpha * dense_score + (1 - alpha) * sparse_score`
    pub score: f64,
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Storage contract for documents and their dual embeddings
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Create a knowledge base
    async fn create_knowledge_base(
        &self,
        title: &str,
        description: &str,
    ) -> Result<KnowledgeBaseRecord>;

    /// Fetch a knowledge base by id
    async fn get_knowledge_base(&self, id: i64) -> Result<Option<KnowledgeBaseRecord>>;

    /// Delete a knowledge base, cascading to its documents and embeddings.
    /// Fails with `KnowledgeBaseNotFound` if the id does not exist.
    async fn delete_knowledge_base(&self, id: i64) -> Result<()>;

    /// Write a document and both embedding rows as one atomic transaction.
    ///
    /// Fails with `KnowledgeBaseNotFound` if `knowledge_base_id` names a
    /// missing knowledge base, or `DimensionMismatch` if either vector
    /// disagrees with the configured model dimensions. Either all three rows
    /// exist after this returns, or none do.
    async fn insert(
        &self,
        knowledge_base_id: Option<i64>,
        content: &str,
        metadata: DocumentMetadata,
        dense: &[f32],
        sparse: &SparseVector,
    ) -> Result<DocumentRecord>;

    /// Delete every document whose source-document identifier matches,
    /// cascading to embeddings. Returns the number of documents deleted;
    /// zero matches is `NotFound`, not success.
    async fn delete_by_source(&self, source_document_id: Uuid) -> Result<u64>;

    /// Fused top-k search within one knowledge base.
    ///
    /// Dense signal: cosine similarity. Sparse signal: non-negative inner
    /// product. Documents matched by only one signal score zero on the other
    /// (full outer union). Results are ordered by fused score descending,
    /// ties broken by document id ascending.
    async fn search(
        &self,
        knowledge_base_id: i64,
        dense_query: &[f32],
        sparse_query: &SparseVector,
        alpha: f64,
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}

/// Shared argument validation, applied before any store or encoder work
pub(crate) fn validate_search_args(alpha: f64, top_k: usize) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) || alpha.is_nan() {
        return Err(EngineError::invalid_argument(format!(
            "alpha must be within [0, 1], got {}",
            alpha
        )));
    }
    if top_k == 0 {
        return Err(EngineError::invalid_argument("top_k must be positive"));
    }
    Ok(())
}

/// Reject vectors whose shape disagrees with the configured dimensions
pub(crate) fn validate_vectors(
    dense_dimension: usize,
    sparse_vocab_size: usize,
    dense: &[f32],
    sparse: &SparseVector,
) -> Result<()> {
    if dense.len() != dense_dimension {
        return Err(EngineError::DimensionMismatch {
            kind: VectorKind::Dense,
            expected: dense_dimension,
            actual: dense.len(),
        });
    }
    if let Some(max_index) = sparse.max_index() {
        if max_index as usize >= sparse_vocab_size {
            return Err(EngineError::DimensionMismatch {
                kind: VectorKind::Sparse,
                expected: sparse_vocab_size,
                actual: max_index as usize + 1,
            });
        }
    }
    Ok(())
}
