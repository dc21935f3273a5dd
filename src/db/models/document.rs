//! Document (chunk record) entity
//!
//! One indexed unit of retrievable text. The source-document identifier is a
//! first-class indexed column rather than a key buried in a JSON map, since
//! bulk deletes filter on it; genuinely arbitrary metadata goes in `extra`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning knowledge base; a document may be unscoped
    pub knowledge_base_id: Option<i64>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Identifier of the source document this chunk came from (indexed)
    pub source_document_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    /// Zero-based position of this chunk within its source document
    pub chunk_index: i32,

    /// Total chunk count for the source document
    pub total_chunks: i32,

    /// Residual free-form metadata
    #[sea_orm(column_type = "JsonBinary")]
    pub extra: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::knowledge_base::Entity",
        from = "Column::KnowledgeBaseId",
        to = "super::knowledge_base::Column::Id",
        on_delete = "Cascade"
    )]
    KnowledgeBase,

    #[sea_orm(has_one = "super::dense_embedding::Entity")]
    DenseEmbedding,

    #[sea_orm(has_one = "super::sparse_embedding::Entity")]
    SparseEmbedding,
}

impl Related<super::knowledge_base::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::KnowledgeBase.def()
    }
}

impl Related<super::dense_embedding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DenseEmbedding.def()
    }
}

impl Related<super::sparse_embedding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SparseEmbedding.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
