//! In-memory embedding store.
//!
//! Mirrors the Postgres backend's observable semantics without a database:
//! same table shape (documents and the two embedding rows live in separate
//! maps), same validation order, same error taxonomy, same fusion and
//! ordering. Used by tests and offline development.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{EngineError, Result};
use crate::sparse::SparseVector;

use super::fusion::fuse_scores;
use super::{
    validate_search_args, validate_vectors, DocumentMetadata, DocumentRecord, EmbeddingStore,
    KnowledgeBaseRecord, SearchResult,
};

#[derive(Debug, Default)]
struct Inner {
    knowledge_bases: BTreeMap<i64, KnowledgeBaseRecord>,
    documents: BTreeMap<i64, DocumentRecord>,
    dense_rows: BTreeMap<i64, Vec<f32>>,
    sparse_rows: BTreeMap<i64, SparseVector>,
    next_knowledge_base_id: i64,
    next_document_id: i64,
    #[cfg(test)]
    sparse_write_fault: bool,
}

/// Map-backed [`EmbeddingStore`] guarded by a single `RwLock`
#[derive(Debug, Clone)]
pub struct MemoryStore {
    dense_dimension: usize,
    sparse_vocab_size: usize,
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new(dense_dimension: usize, sparse_vocab_size: usize) -> Self {
        Self {
            dense_dimension,
            sparse_vocab_size,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Number of stored documents, across all knowledge bases
    pub async fn document_count(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    /// Make the next sparse embedding write fail after the document and
    /// dense rows have been written, to exercise the rollback path.
    #[cfg(test)]
    async fn fail_next_sparse_write(&self) {
        self.inner.write().await.sparse_write_fault = true;
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    async fn create_knowledge_base(
        &self,
        title: &str,
        description: &str,
    ) -> Result<KnowledgeBaseRecord> {
        let mut inner = self.inner.write().await;
        inner.next_knowledge_base_id += 1;
        let record = KnowledgeBaseRecord {
            id: inner.next_knowledge_base_id,
            title: title.to_owned(),
            description: description.to_owned(),
            created_at: Utc::now(),
        };
        inner.knowledge_bases.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_knowledge_base(&self, id: i64) -> Result<Option<KnowledgeBaseRecord>> {
        Ok(self.inner.read().await.knowledge_bases.get(&id).cloned())
    }

    async fn delete_knowledge_base(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.knowledge_bases.remove(&id).is_none() {
            return Err(EngineError::KnowledgeBaseNotFound { id });
        }
        // Cascade across all three tables.
        let doomed: Vec<i64> = inner
            .documents
            .iter()
            .filter(|(_, doc)| doc.knowledge_base_id == Some(id))
            .map(|(&doc_id, _)| doc_id)
            .collect();
        for doc_id in doomed {
            inner.documents.remove(&doc_id);
            inner.dense_rows.remove(&doc_id);
            inner.sparse_rows.remove(&doc_id);
        }
        Ok(())
    }

    async fn insert(
        &self,
        knowledge_base_id: Option<i64>,
        content: &str,
        metadata: DocumentMetadata,
        dense: &[f32],
        sparse: &SparseVector,
    ) -> Result<DocumentRecord> {
        validate_vectors(self.dense_dimension, self.sparse_vocab_size, dense, sparse)?;

        // One write lock across all three row writes stands in for the
        // backend transaction: no reader ever sees a partial insert, and a
        // failed embedding write removes the rows written before it.
        let mut inner = self.inner.write().await;
        if let Some(id) = knowledge_base_id {
            if !inner.knowledge_bases.contains_key(&id) {
                return Err(EngineError::KnowledgeBaseNotFound { id });
            }
        }

        inner.next_document_id += 1;
        let record = DocumentRecord {
            id: inner.next_document_id,
            knowledge_base_id,
            content: content.to_owned(),
            metadata,
            created_at: Utc::now(),
        };
        inner.documents.insert(record.id, record.clone());
        inner.dense_rows.insert(record.id, dense.to_vec());

        #[cfg(test)]
        if inner.sparse_write_fault {
            inner.sparse_write_fault = false;
            inner.documents.remove(&record.id);
            inner.dense_rows.remove(&record.id);
            return Err(EngineError::Database(sea_orm::DbErr::Custom(
                "sparse embedding write failed".to_owned(),
            )));
        }

        inner.sparse_rows.insert(record.id, sparse.clone());
        Ok(record)
    }

    async fn delete_by_source(&self, source_document_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<i64> = inner
            .documents
            .iter()
            .filter(|(_, doc)| doc.metadata.source_document_id == source_document_id)
            .map(|(&doc_id, _)| doc_id)
            .collect();
        if doomed.is_empty() {
            return Err(EngineError::NotFound { source_document_id });
        }
        for doc_id in &doomed {
            inner.documents.remove(doc_id);
            inner.dense_rows.remove(doc_id);
            inner.sparse_rows.remove(doc_id);
        }
        Ok(doomed.len() as u64)
    }

    async fn search(
        &self,
        knowledge_base_id: i64,
        dense_query: &[f32],
        sparse_query: &SparseVector,
        alpha: f64,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_search_args(alpha, top_k)?;
        validate_vectors(
            self.dense_dimension,
            self.sparse_vocab_size,
            dense_query,
            sparse_query,
        )?;

        let inner = self.inner.read().await;
        if !inner.knowledge_bases.contains_key(&knowledge_base_id) {
            return Err(EngineError::KnowledgeBaseNotFound {
                id: knowledge_base_id,
            });
        }

        // Both signals are scored for every document in scope; the limit
        // applies only to the fused ranking, so a document that is runner-up
        // in each signal can still be the fused winner.
        let mut dense_scores: BTreeMap<i64, f64> = BTreeMap::new();
        let mut sparse_scores: BTreeMap<i64, f64> = BTreeMap::new();
        for (&doc_id, doc) in &inner.documents {
            if doc.knowledge_base_id != Some(knowledge_base_id) {
                continue;
            }
            if let Some(dense) = inner.dense_rows.get(&doc_id) {
                dense_scores.insert(doc_id, cosine_similarity(dense_query, dense));
            }
            if let Some(sparse) = inner.sparse_rows.get(&doc_id) {
                sparse_scores.insert(doc_id, sparse_query.dot(sparse));
            }
        }

        let ranked = fuse_scores(alpha, &dense_scores, &sparse_scores);
        let results = ranked
            .into_iter()
            .take(top_k)
            .filter_map(|(doc_id, score)| {
                inner.documents.get(&doc_id).map(|doc| SearchResult {
                    document_id: doc_id,
                    score,
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                })
            })
            .collect();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(source: Uuid, index: i32) -> DocumentMetadata {
        DocumentMetadata {
            source_document_id: source,
            file_name: "notes.txt".to_owned(),
            chunk_index: index,
            total_chunks: 2,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn insert_requires_existing_knowledge_base() {
        let store = MemoryStore::new(3, 16);
        let sparse = SparseVector::from_entries([(1, 1.0)]).unwrap();
        let err = store
            .insert(Some(42), "text", metadata(Uuid::new_v4(), 0), &[0.0; 3], &sparse)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::KnowledgeBaseNotFound { id: 42 }));
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn rejected_insert_leaves_no_rows() {
        let store = MemoryStore::new(3, 16);
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let oversized = SparseVector::from_entries([(16, 1.0)]).unwrap();
        let err = store
            .insert(Some(kb.id), "text", metadata(Uuid::new_v4(), 0), &[0.0; 3], &oversized)
            .await
            .unwrap_err();
        assert!(err.is_dimension_mismatch());
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn failed_sparse_write_rolls_back_the_whole_insert() {
        let store = MemoryStore::new(3, 16);
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let sparse = SparseVector::from_entries([(1, 1.0)]).unwrap();

        store.fail_next_sparse_write().await;
        let err = store
            .insert(Some(kb.id), "text", metadata(Uuid::new_v4(), 0), &[1.0, 0.0, 0.0], &sparse)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Database(_)));

        // No row of the failed insert is observable in any table.
        {
            let inner = store.inner.read().await;
            assert!(inner.documents.is_empty());
            assert!(inner.dense_rows.is_empty());
            assert!(inner.sparse_rows.is_empty());
        }

        // The store stays usable after the rollback.
        let record = store
            .insert(Some(kb.id), "text", metadata(Uuid::new_v4(), 0), &[1.0, 0.0, 0.0], &sparse)
            .await
            .unwrap();
        let inner = store.inner.read().await;
        assert!(inner.dense_rows.contains_key(&record.id));
        assert!(inner.sparse_rows.contains_key(&record.id));
    }

    #[tokio::test]
    async fn delete_by_source_is_not_idempotent() {
        let store = MemoryStore::new(3, 16);
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let source = Uuid::new_v4();
        let sparse = SparseVector::from_entries([(1, 1.0)]).unwrap();
        for i in 0..2 {
            store
                .insert(Some(kb.id), "text", metadata(source, i), &[1.0, 0.0, 0.0], &sparse)
                .await
                .unwrap();
        }
        assert_eq!(store.delete_by_source(source).await.unwrap(), 2);
        let err = store.delete_by_source(source).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn knowledge_base_deletion_cascades() {
        let store = MemoryStore::new(3, 16);
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let sparse = SparseVector::from_entries([(1, 1.0)]).unwrap();
        store
            .insert(Some(kb.id), "text", metadata(Uuid::new_v4(), 0), &[1.0, 0.0, 0.0], &sparse)
            .await
            .unwrap();
        store.delete_knowledge_base(kb.id).await.unwrap();
        assert_eq!(store.document_count().await, 0);
        let inner = store.inner.read().await;
        assert!(inner.dense_rows.is_empty());
        assert!(inner.sparse_rows.is_empty());
        drop(inner);
        let err = store.delete_knowledge_base(kb.id).await.unwrap_err();
        assert!(matches!(err, EngineError::KnowledgeBaseNotFound { .. }));
    }

    #[tokio::test]
    async fn search_missing_knowledge_base_fails() {
        let store = MemoryStore::new(3, 16);
        let sparse = SparseVector::new();
        let err = store
            .search(9, &[1.0, 0.0, 0.0], &sparse, 0.5, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::KnowledgeBaseNotFound { id: 9 }));
    }
}
