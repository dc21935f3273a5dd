//! Error types for the retrieval engine
//!
//! One taxonomy for the whole crate: argument validation, scope/row lookup
//! failures, model/config drift, encoder backend failures, and storage errors.
//! The engine performs no automatic retries and never degrades silently (a
//! failed encoding is an error, not a zero vector); every variant carries
//! enough context to diagnose without inspecting internals.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which embedding signal a dimension check refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Dense,
    Sparse,
}

impl std::fmt::Display for VectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorKind::Dense => write!(f, "dense"),
            VectorKind::Sparse => write!(f, "sparse"),
        }
    }
}

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    // Validation errors
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{kind} vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        kind: VectorKind,
        expected: usize,
        actual: usize,
    },

    // Resource errors
    #[error("Knowledge base not found: {id}")]
    KnowledgeBaseNotFound { id: i64 },

    #[error("No documents found for source document {source_document_id}")]
    NotFound { source_document_id: Uuid },

    // Encoder backend errors
    #[error("Encoding failed for model {model}: {message}")]
    Encoding { model: String, message: String },

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Reject an invalid caller-supplied argument
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EngineError::InvalidArgument {
            message: message.into(),
        }
    }

    /// True for the reportable, non-fatal "delete matched nothing" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// True when a vector length disagrees with the configured model dimension
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, EngineError::DimensionMismatch { .. })
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_names_both_sides() {
        let err = EngineError::DimensionMismatch {
            kind: VectorKind::Dense,
            expected: 768,
            actual: 512,
        };
        let msg = err.to_string();
        assert!(msg.contains("768"));
        assert!(msg.contains("512"));
        assert!(msg.contains("dense"));
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn not_found_is_distinct_from_other_errors() {
        let err = EngineError::NotFound {
            source_document_id: Uuid::nil(),
        };
        assert!(err.is_not_found());
        assert!(!EngineError::KnowledgeBaseNotFound { id: 1 }.is_not_found());
    }
}
