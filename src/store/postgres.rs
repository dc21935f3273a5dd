//! Postgres + pgvector backend.
//!
//! Entity CRUD goes through SeaORM; everything that touches a vector column
//! goes through parameterized raw SQL, with vectors passed as text and cast
//! server-side (`$n::vector`, `$n::sparsevec`). Scoring happens inside the
//! database: cosine via `<=>`, sparse inner product via `<#>` (which pgvector
//! returns negated, so the query flips the sign back).

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, Set, Statement, TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::models::{
    DocumentActiveModel, DocumentColumn, DocumentEntity, KnowledgeBaseActiveModel,
    KnowledgeBaseEntity,
};
use crate::db::DbPool;
use crate::errors::{EngineError, Result};
use crate::sparse::SparseVector;

use super::{
    validate_search_args, validate_vectors, DocumentMetadata, DocumentRecord, EmbeddingStore,
    KnowledgeBaseRecord, SearchResult,
};

/// [`EmbeddingStore`] backed by Postgres with the pgvector extension
#[derive(Clone)]
pub struct PgEmbeddingStore {
    pool: DbPool,
    dense_dimension: usize,
    sparse_vocab_size: usize,
    dense_model: String,
    sparse_model: String,
}

impl PgEmbeddingStore {
    pub fn new(
        pool: DbPool,
        dense_dimension: usize,
        sparse_vocab_size: usize,
        dense_model: impl Into<String>,
        sparse_model: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            dense_dimension,
            sparse_vocab_size,
            dense_model: dense_model.into(),
            sparse_model: sparse_model.into(),
        }
    }
}

/// pgvector dense text literal: `[v1,v2,...]`
fn dense_to_wire(dense: &[f32]) -> String {
    let mut out = String::with_capacity(dense.len() * 10 + 2);
    out.push('[');
    for (i, value) in dense.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out.push(']');
    out
}

/// Both signals are scored for every document in the knowledge base, then
/// joined with a full outer join so a document found by only one signal still
/// surfaces, scoring zero on the side that missed it. The limit applies only
/// to the fused ranking: a document that is runner-up in each signal can
/// still be the fused winner, so neither CTE may truncate its candidates.
const SEARCH_SQL: &str = r#"
WITH dense_scored AS (
    SELECT de.document_id,
           1 - (de.embedding <=> $2::vector) AS score
    FROM dense_embeddings de
    JOIN documents d ON d.id = de.document_id
    WHERE d.knowledge_base_id = $1
),
sparse_scored AS (
    SELECT se.document_id,
           -(se.embedding <#> $3::sparsevec) AS score
    FROM sparse_embeddings se
    JOIN documents d ON d.id = se.document_id
    WHERE d.knowledge_base_id = $1
)
SELECT d.id AS document_id,
       $4::float8 * COALESCE(dr.score, 0)
           + (1 - $4::float8) * COALESCE(sr.score, 0) AS score,
       d.content,
       d.source_document_id,
       d.file_name,
       d.chunk_index,
       d.total_chunks,
       d.extra
FROM dense_scored dr
FULL OUTER JOIN sparse_scored sr ON dr.document_id = sr.document_id
JOIN documents d ON d.id = COALESCE(dr.document_id, sr.document_id)
ORDER BY score DESC, document_id ASC
LIMIT $5
"#;

#[derive(Debug, FromQueryResult)]
struct SearchRow {
    document_id: i64,
    score: f64,
    content: String,
    source_document_id: Uuid,
    file_name: String,
    chunk_index: i32,
    total_chunks: i32,
    extra: serde_json::Value,
}

impl SearchRow {
    fn into_result(self) -> SearchResult {
        let extra = match self.extra {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        SearchResult {
            document_id: self.document_id,
            score: self.score,
            content: self.content,
            metadata: DocumentMetadata {
                source_document_id: self.source_document_id,
                file_name: self.file_name,
                chunk_index: self.chunk_index,
                total_chunks: self.total_chunks,
                extra,
            },
        }
    }
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingStore {
    #[instrument(skip(self, description))]
    async fn create_knowledge_base(
        &self,
        title: &str,
        description: &str,
    ) -> Result<KnowledgeBaseRecord> {
        let model = KnowledgeBaseActiveModel {
            title: Set(title.to_owned()),
            description: Set(description.to_owned()),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.pool.write())
        .await?;

        Ok(KnowledgeBaseRecord {
            id: model.id,
            title: model.title,
            description: model.description,
            created_at: model.created_at.with_timezone(&Utc),
        })
    }

    async fn get_knowledge_base(&self, id: i64) -> Result<Option<KnowledgeBaseRecord>> {
        let found = KnowledgeBaseEntity::find_by_id(id)
            .one(self.pool.read())
            .await?;
        Ok(found.map(|model| KnowledgeBaseRecord {
            id: model.id,
            title: model.title,
            description: model.description,
            created_at: model.created_at.with_timezone(&Utc),
        }))
    }

    #[instrument(skip(self))]
    async fn delete_knowledge_base(&self, id: i64) -> Result<()> {
        // Documents and embeddings go with it via ON DELETE CASCADE.
        let outcome = KnowledgeBaseEntity::delete_by_id(id)
            .exec(self.pool.write())
            .await?;
        if outcome.rows_affected == 0 {
            return Err(EngineError::KnowledgeBaseNotFound { id });
        }
        Ok(())
    }

    #[instrument(skip(self, content, metadata, dense, sparse), fields(knowledge_base_id))]
    async fn insert(
        &self,
        knowledge_base_id: Option<i64>,
        content: &str,
        metadata: DocumentMetadata,
        dense: &[f32],
        sparse: &SparseVector,
    ) -> Result<DocumentRecord> {
        validate_vectors(self.dense_dimension, self.sparse_vocab_size, dense, sparse)?;

        let txn = self.pool.write().begin().await?;

        if let Some(id) = knowledge_base_id {
            if KnowledgeBaseEntity::find_by_id(id).one(&txn).await?.is_none() {
                return Err(EngineError::KnowledgeBaseNotFound { id });
            }
        }

        let document = DocumentActiveModel {
            knowledge_base_id: Set(knowledge_base_id),
            content: Set(content.to_owned()),
            source_document_id: Set(metadata.source_document_id),
            file_name: Set(metadata.file_name.clone()),
            chunk_index: Set(metadata.chunk_index),
            total_chunks: Set(metadata.total_chunks),
            extra: Set(serde_json::Value::Object(metadata.extra.clone())),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO dense_embeddings (document_id, embedding, model_name, created_at)
            VALUES ($1, $2::vector, $3, NOW())
            "#,
            vec![
                document.id.into(),
                dense_to_wire(dense).into(),
                self.dense_model.clone().into(),
            ],
        ))
        .await?;

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO sparse_embeddings (document_id, embedding, model_name, created_at)
            VALUES ($1, $2::sparsevec, $3, NOW())
            "#,
            vec![
                document.id.into(),
                sparse.to_wire(self.sparse_vocab_size).into(),
                self.sparse_model.clone().into(),
            ],
        ))
        .await?;

        txn.commit().await?;
        debug!(document_id = document.id, "document and embeddings stored");

        Ok(DocumentRecord {
            id: document.id,
            knowledge_base_id: document.knowledge_base_id,
            content: document.content,
            metadata,
            created_at: document.created_at.with_timezone(&Utc),
        })
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source_document_id: Uuid) -> Result<u64> {
        let outcome = DocumentEntity::delete_many()
            .filter(DocumentColumn::SourceDocumentId.eq(source_document_id))
            .exec(self.pool.write())
            .await?;
        if outcome.rows_affected == 0 {
            return Err(EngineError::NotFound { source_document_id });
        }
        debug!(
            deleted = outcome.rows_affected,
            "documents removed by source id"
        );
        Ok(outcome.rows_affected)
    }

    #[instrument(skip(self, dense_query, sparse_query))]
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

        if KnowledgeBaseEntity::find_by_id(knowledge_base_id)
            .one(self.pool.read())
            .await?
            .is_none()
        {
            return Err(EngineError::KnowledgeBaseNotFound {
                id: knowledge_base_id,
            });
        }

        let rows = SearchRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SEARCH_SQL,
            vec![
                knowledge_base_id.into(),
                dense_to_wire(dense_query).into(),
                sparse_query.to_wire(self.sparse_vocab_size).into(),
                alpha.into(),
                (top_k as i64).into(),
            ],
        ))
        .all(self.pool.read())
        .await?;

        Ok(rows.into_iter().map(SearchRow::into_result).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_wire_format_is_bracketed_csv() {
        assert_eq!(dense_to_wire(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
        assert_eq!(dense_to_wire(&[]), "[]");
    }

    #[test]
    fn search_sql_fuses_with_coalesce_over_full_outer_join() {
        assert!(SEARCH_SQL.contains("FULL OUTER JOIN"));
        assert!(SEARCH_SQL.contains("COALESCE(dr.score, 0)"));
        assert!(SEARCH_SQL.contains("COALESCE(sr.score, 0)"));
        // pgvector's <#> yields the negated inner product.
        assert!(SEARCH_SQL.contains("-(se.embedding <#> $3::sparsevec)"));
        assert!(SEARCH_SQL.contains("ORDER BY score DESC, document_id ASC"));
    }

    #[test]
    fn search_sql_limits_only_the_fused_ranking() {
        // Truncating either CTE would change the fused order; the single
        // LIMIT belongs to the final SELECT.
        assert_eq!(SEARCH_SQL.matches("LIMIT").count(), 1);
        assert!(SEARCH_SQL.trim_end().ends_with("LIMIT $5"));
    }
}
