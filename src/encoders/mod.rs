//! Encoder adapters
//!
//! Two capability contracts over embedding model backends:
//! - [`DenseEncoder`] produces fixed-length semantic vectors
//! - [`SparseEncoder`] produces non-negative weights over a fixed vocabulary
//!
//! Backends are expensive to initialize and cheap to call, so adapters are
//! built once, shared behind `Arc`, and reused for every encode call. An
//! encoding failure is always surfaced as `EngineError::Encoding`; the engine
//! never substitutes a zero vector for a failed call.

mod hashing;
mod remote;

pub use hashing::{HashingDenseEncoder, HashingSparseEncoder};
pub use remote::{RemoteDenseEncoder, RemoteSparseEncoder};

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{EngineError, Result, VectorKind};
use crate::sparse::SparseVector;

/// Dense semantic embedding contract
#[async_trait]
pub trait DenseEncoder: Send + Sync {
    /// Encode text into a vector of exactly `dimension()` floats
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, stamped onto stored embeddings
    fn model_name(&self) -> &str;

    /// Fixed output dimension
    fn dimension(&self) -> usize;
}

/// Sparse lexical embedding contract
#[async_trait]
pub trait SparseEncoder: Send + Sync {
    /// Encode text into non-negative weights over the model vocabulary
    async fn encode(&self, text: &str) -> Result<SparseVector>;

    /// Model identifier, stamped onto stored embeddings
    fn model_name(&self) -> &str;

    /// Fixed vocabulary size
    fn vocab_size(&self) -> usize;
}

/// Both encoders, constructed once at process start and passed by handle into
/// the ingestion pipeline and the retriever.
#[derive(Clone)]
pub struct EncoderSet {
    pub dense: Arc<dyn DenseEncoder>,
    pub sparse: Arc<dyn SparseEncoder>,
}

impl EncoderSet {
    pub fn new(dense: Arc<dyn DenseEncoder>, sparse: Arc<dyn SparseEncoder>) -> Self {
        Self { dense, sparse }
    }
}

/// Collapse per-token masked-LM logits into a sparse weight vector: apply the
/// `ln(1 + relu(x))` saturation to each masked token position, max-pool across
/// positions, and keep only the non-zero entries.
///
/// `logits` is one row of `vocab_size` values per token position and
/// `attention_mask` marks the positions that carry real tokens (non-zero)
/// rather than padding.
pub fn pool_masked_logits(
    logits: &[Vec<f32>],
    attention_mask: &[u8],
    vocab_size: usize,
) -> Result<SparseVector> {
    if logits.len() != attention_mask.len() {
        return Err(EngineError::invalid_argument(format!(
            "attention mask covers {} positions but logits have {}",
            attention_mask.len(),
            logits.len()
        )));
    }

    let mut pooled = vec![0.0f32; vocab_size];
    for (row, &mask) in logits.iter().zip(attention_mask) {
        if mask == 0 {
            continue;
        }
        if row.len() != vocab_size {
            return Err(EngineError::DimensionMismatch {
                kind: VectorKind::Sparse,
                expected: vocab_size,
                actual: row.len(),
            });
        }
        for (slot, &logit) in pooled.iter_mut().zip(row) {
            let weight = (1.0 + logit.max(0.0)).ln();
            if weight > *slot {
                *slot = weight;
            }
        }
    }

    SparseVector::from_entries(
        pooled
            .into_iter()
            .enumerate()
            .filter(|&(_, w)| w > 0.0)
            .map(|(i, w)| (i as u32, w)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooling_applies_saturation_and_max() {
        // Two token positions over a 4-entry vocabulary
        let logits = vec![
            vec![1.0, -2.0, 0.0, 3.0],
            vec![0.5, 4.0, -1.0, 1.0],
        ];
        let pooled = pool_masked_logits(&logits, &[1, 1], 4).unwrap();

        // relu clamps negatives to zero, ln(1 + 0) = 0 drops the entry
        assert_eq!(pooled.get(2), 0.0);
        // max across positions, then ln(1 + x)
        assert!((pooled.get(0) - (2.0f32).ln()).abs() < 1e-6);
        assert!((pooled.get(1) - (5.0f32).ln()).abs() < 1e-6);
        assert!((pooled.get(3) - (4.0f32).ln()).abs() < 1e-6);
    }

    #[test]
    fn masked_positions_are_ignored() {
        let logits = vec![
            vec![1.0, 0.0],
            vec![9.0, 9.0], // padding
        ];
        let pooled = pool_masked_logits(&logits, &[1, 0], 2).unwrap();
        assert!((pooled.get(0) - (2.0f32).ln()).abs() < 1e-6);
        assert_eq!(pooled.get(1), 0.0);
    }

    #[test]
    fn wrong_row_width_is_a_dimension_mismatch() {
        let err = pool_masked_logits(&[vec![1.0, 2.0, 3.0]], &[1], 2).unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn mask_length_must_match_positions() {
        let err = pool_masked_logits(&[vec![1.0, 2.0]], &[1, 1], 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
    }
}
