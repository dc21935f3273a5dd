//! Hybrid retrieval
//!
//! Encodes the query with both models and delegates scoring and fusion to the
//! store. The two query encodings run concurrently; argument validation
//! happens before either encoder is touched, so a bad request never costs an
//! encoding round trip.

use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use crate::config::RetrievalConfig;
use crate::encoders::EncoderSet;
use crate::errors::Result;
use crate::store::{validate_search_args, EmbeddingStore, SearchResult};

pub struct HybridRetriever {
    store: Arc<dyn EmbeddingStore>,
    encoders: EncoderSet,
    defaults: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        encoders: EncoderSet,
        defaults: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            encoders,
            defaults,
        }
    }

    /// Search with the configured default `alpha` and `top_k`
    pub async fn retrieve(
        &self,
        knowledge_base_id: i64,
        query: &str,
    ) -> Result<Vec<SearchResult>> {
        self.retrieve_with(knowledge_base_id, query, self.defaults.alpha, self.defaults.top_k)
            .await
    }

    /// Search with explicit fusion weight and result count.
    ///
    /// `alpha` weights the dense signal: 1.0 is pure dense, 0.0 is pure
    /// sparse. `top_k` must be positive.
    #[instrument(skip(self, query), fields(knowledge_base_id, alpha, top_k))]
    pub async fn retrieve_with(
        &self,
        knowledge_base_id: i64,
        query: &str,
        alpha: f64,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_search_args(alpha, top_k)?;

        let start = Instant::now();
        let (dense, sparse) = tokio::join!(
            self.encoders.dense.encode(query),
            self.encoders.sparse.encode(query),
        );
        let dense = dense?;
        let sparse = sparse?;

        let results = self
            .store
            .search(knowledge_base_id, &dense, &sparse, alpha, top_k)
            .await?;

        metrics::counter!("kbfuse_search_ops_total").increment(1);
        metrics::histogram!("kbfuse_search_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        metrics::histogram!("kbfuse_search_results_count").record(results.len() as f64);

        tracing::debug!(
            knowledge_base_id,
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "hybrid search completed"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::{HashingDenseEncoder, HashingSparseEncoder};
    use crate::errors::EngineError;
    use crate::store::MemoryStore;

    fn retriever(store: Arc<MemoryStore>) -> HybridRetriever {
        let encoders = EncoderSet {
            dense: Arc::new(HashingDenseEncoder::new(32)),
            sparse: Arc::new(HashingSparseEncoder::new(64)),
        };
        HybridRetriever::new(store, encoders, RetrievalConfig::default())
    }

    #[tokio::test]
    async fn invalid_arguments_fail_before_any_store_access() {
        let store = Arc::new(MemoryStore::new(32, 64));
        let retriever = retriever(store);
        // No knowledge base exists, yet the argument error wins: validation
        // runs before encoding and store access.
        let err = retriever
            .retrieve_with(1, "query", 1.5, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
        let err = retriever.retrieve_with(1, "query", 0.5, 0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn defaults_are_applied() {
        let store = Arc::new(MemoryStore::new(32, 64));
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let retriever = retriever(store);
        let results = retriever.retrieve(kb.id, "anything").await.unwrap();
        assert!(results.is_empty());
    }
}
