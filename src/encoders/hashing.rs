//! Deterministic model-free encoders
//!
//! Hashed bag-of-tokens adapters for tests and offline development. They
//! honor the encoder contracts (fixed dense dimension, non-negative sparse
//! weights) and are fully deterministic, so retrieval results are reproducible
//! without a model backend. Texts sharing tokens score close; disjoint texts
//! score near zero.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use super::{DenseEncoder, SparseEncoder};
use crate::errors::{EngineError, Result};
use crate::sparse::SparseVector;

const DENSE_MODEL_NAME: &str = "hashing-dense";
const SPARSE_MODEL_NAME: &str = "hashing-sparse";

fn token_bucket(token: &str, buckets: usize) -> usize {
    // DefaultHasher with default keys is stable across calls within a build
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() % buckets as u64) as usize
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
}

/// Dense encoder hashing tokens into a fixed number of buckets, L2-normalized
pub struct HashingDenseEncoder {
    dimension: usize,
}

impl HashingDenseEncoder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl DenseEncoder for HashingDenseEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut seen = false;
        for token in tokens(text) {
            vector[token_bucket(&token, self.dimension)] += 1.0;
            seen = true;
        }
        if !seen {
            return Err(EngineError::Encoding {
                model: DENSE_MODEL_NAME.to_string(),
                message: "input produced no tokens".to_string(),
            });
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= norm;
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        DENSE_MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Sparse encoder hashing tokens into vocabulary indices with
/// `ln(1 + count)` weights
pub struct HashingSparseEncoder {
    vocab_size: usize,
}

impl HashingSparseEncoder {
    pub fn new(vocab_size: usize) -> Self {
        Self { vocab_size }
    }
}

#[async_trait]
impl SparseEncoder for HashingSparseEncoder {
    async fn encode(&self, text: &str) -> Result<SparseVector> {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for token in tokens(text) {
            *counts
                .entry(token_bucket(&token, self.vocab_size) as u32)
                .or_insert(0) += 1;
        }
        if counts.is_empty() {
            return Err(EngineError::Encoding {
                model: SPARSE_MODEL_NAME.to_string(),
                message: "input produced no tokens".to_string(),
            });
        }

        SparseVector::from_entries(
            counts
                .into_iter()
                .map(|(index, count)| (index, (1.0 + count as f32).ln())),
        )
    }

    fn model_name(&self) -> &str {
        SPARSE_MODEL_NAME
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}
