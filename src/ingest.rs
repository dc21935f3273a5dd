//! Document ingestion pipeline
//!
//! Handles the core ingestion workflow:
//! 1. Split raw text into overlapping chunks
//! 2. Encode every chunk with both embedding models
//! 3. Store each chunk atomically with its dense and sparse embeddings
//!
//! Encoding runs concurrently up to the configured limit; storage is
//! sequential so a failure leaves a clean prefix of fully-stored chunks and
//! nothing partial.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::instrument;
use uuid::Uuid;

use crate::chunker::{split_text, TextChunk};
use crate::config::{ChunkingConfig, EmbeddingConfig};
use crate::encoders::EncoderSet;
use crate::errors::Result;
use crate::sparse::SparseVector;
use crate::store::{DocumentMetadata, EmbeddingStore};

pub struct IngestionPipeline {
    store: Arc<dyn EmbeddingStore>,
    encoders: EncoderSet,
    chunking: ChunkingConfig,
    encode_concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn EmbeddingStore>,
        encoders: EncoderSet,
        chunking: ChunkingConfig,
        embedding: &EmbeddingConfig,
    ) -> Self {
        Self {
            store,
            encoders,
            chunking,
            encode_concurrency: embedding.encode_concurrency.max(1),
        }
    }

    /// Ingest one source document into a knowledge base.
    ///
    /// Every stored chunk is stamped with the caller's `source_document_id`
    /// and `file_name` plus its `chunk_index` and the `total_chunks` of this
    /// run, so the whole document can later be removed in one call.
    ///
    /// Returns the stored document ids in chunk order.
    #[instrument(skip(self, raw_text), fields(source_document_id = %source_document_id, file_name))]
    pub async fn ingest(
        &self,
        knowledge_base_id: Option<i64>,
        source_document_id: Uuid,
        file_name: &str,
        raw_text: &str,
    ) -> Result<Vec<i64>> {
        let start = Instant::now();

        let chunks = split_text(raw_text, &self.chunking)?;
        if chunks.is_empty() {
            tracing::warn!(%source_document_id, "no chunks produced, nothing to ingest");
            return Ok(vec![]);
        }
        let total_chunks = chunks.len() as i32;

        let embedding_start = Instant::now();
        let encoded = self.encode_chunks(chunks).await?;
        let embedding_duration = embedding_start.elapsed();

        let mut document_ids = Vec::with_capacity(encoded.len());
        for (chunk, dense, sparse) in encoded {
            let metadata = DocumentMetadata {
                source_document_id,
                file_name: file_name.to_owned(),
                chunk_index: chunk.index,
                total_chunks,
                extra: serde_json::Map::new(),
            };
            let record = self
                .store
                .insert(knowledge_base_id, &chunk.content, metadata, &dense, &sparse)
                .await?;
            document_ids.push(record.id);
        }

        let total_duration = start.elapsed();
        metrics::counter!("kbfuse_ingest_documents_total").increment(1);
        metrics::counter!("kbfuse_ingest_chunks_total").increment(document_ids.len() as u64);
        metrics::histogram!("kbfuse_ingest_duration_seconds").record(total_duration.as_secs_f64());
        metrics::histogram!("kbfuse_embedding_duration_seconds")
            .record(embedding_duration.as_secs_f64());

        tracing::info!(
            %source_document_id,
            chunks = document_ids.len(),
            total_ms = total_duration.as_millis(),
            "document ingested"
        );

        Ok(document_ids)
    }

    /// Remove every chunk of a previously ingested source document.
    /// Returns the number of chunks deleted.
    #[instrument(skip(self))]
    pub async fn remove(&self, source_document_id: Uuid) -> Result<u64> {
        let deleted = self.store.delete_by_source(source_document_id).await?;
        metrics::counter!("kbfuse_ingest_deletes_total").increment(1);
        Ok(deleted)
    }

    /// Encode all chunks with bounded concurrency, preserving chunk order
    async fn encode_chunks(
        &self,
        chunks: Vec<TextChunk>,
    ) -> Result<Vec<(TextChunk, Vec<f32>, SparseVector)>> {
        let encoders = self.encoders.clone();
        stream::iter(chunks)
            .map(|chunk| {
                let encoders = encoders.clone();
                async move {
                    let (dense, sparse) = futures::future::try_join(
                        encoders.dense.encode(&chunk.content),
                        encoders.sparse.encode(&chunk.content),
                    )
                    .await?;
                    Ok((chunk, dense, sparse))
                }
            })
            .buffered(self.encode_concurrency)
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::{HashingDenseEncoder, HashingSparseEncoder};
    use crate::store::MemoryStore;

    fn pipeline(store: Arc<MemoryStore>) -> IngestionPipeline {
        let encoders = EncoderSet {
            dense: Arc::new(HashingDenseEncoder::new(32)),
            sparse: Arc::new(HashingSparseEncoder::new(64)),
        };
        let embedding = EmbeddingConfig {
            encode_concurrency: 2,
            ..Default::default()
        };
        IngestionPipeline::new(
            store,
            encoders,
            ChunkingConfig {
                chunk_size: 40,
                chunk_overlap: 10,
            },
            &embedding,
        )
    }

    #[tokio::test]
    async fn stamps_chunk_positions_and_source() {
        let store = Arc::new(MemoryStore::new(32, 64));
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let pipeline = pipeline(store.clone());

        let source = Uuid::new_v4();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let ids = pipeline
            .ingest(Some(kb.id), source, "letters.txt", text)
            .await
            .unwrap();
        assert!(ids.len() > 1);

        let hits = store
            .search(
                kb.id,
                &pipeline.encoders.dense.encode("alpha beta").await.unwrap(),
                &pipeline.encoders.sparse.encode("alpha beta").await.unwrap(),
                0.6,
                ids.len(),
            )
            .await
            .unwrap();
        for hit in &hits {
            assert_eq!(hit.metadata.source_document_id, source);
            assert_eq!(hit.metadata.file_name, "letters.txt");
            assert_eq!(hit.metadata.total_chunks, ids.len() as i32);
            assert!((hit.metadata.chunk_index as usize) < ids.len());
        }
    }

    #[tokio::test]
    async fn empty_input_ingests_nothing() {
        let store = Arc::new(MemoryStore::new(32, 64));
        let pipeline = pipeline(store.clone());
        let ids = pipeline
            .ingest(None, Uuid::new_v4(), "empty.txt", "")
            .await
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn remove_deletes_all_chunks_of_a_source() {
        let store = Arc::new(MemoryStore::new(32, 64));
        let kb = store.create_knowledge_base("kb", "").await.unwrap();
        let pipeline = pipeline(store.clone());

        let source = Uuid::new_v4();
        let ids = pipeline
            .ingest(Some(kb.id), source, "doc.txt", "one two three four five six seven eight nine ten")
            .await
            .unwrap();
        let deleted = pipeline.remove(source).await.unwrap();
        assert_eq!(deleted, ids.len() as u64);
        assert_eq!(store.document_count().await, 0);
    }
}
