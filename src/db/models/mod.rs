//! SeaORM entity models

mod dense_embedding;
mod document;
mod knowledge_base;
mod sparse_embedding;

pub use knowledge_base::{
    ActiveModel as KnowledgeBaseActiveModel, Column as KnowledgeBaseColumn,
    Entity as KnowledgeBaseEntity, Model as KnowledgeBase,
};

pub use document::{
    ActiveModel as DocumentActiveModel, Column as DocumentColumn, Entity as DocumentEntity,
    Model as Document,
};

pub use dense_embedding::{
    ActiveModel as DenseEmbeddingActiveModel, Column as DenseEmbeddingColumn,
    Entity as DenseEmbeddingEntity, Model as DenseEmbedding,
};

pub use sparse_embedding::{
    ActiveModel as SparseEmbeddingActiveModel, Column as SparseEmbeddingColumn,
    Entity as SparseEmbeddingEntity, Model as SparseEmbedding,
};
