//! Sparse vector representation
//!
//! A mostly-zero weight vector over a fixed vocabulary, stored as
//! (index, weight) pairs. Weights are non-negative by contract (they come out
//! of a log(1 + relu) saturation), so inner products between sparse vectors
//! are non-negative. Entries are kept in a `BTreeMap` so iteration order and
//! the textual wire form are deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// Sparse weight vector over a fixed vocabulary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: BTreeMap<u32, f32>,
}

impl SparseVector {
    /// Create an empty sparse vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (index, weight) pairs.
    ///
    /// Zero weights are dropped; negative or non-finite weights are rejected.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, f32)>,
    {
        let mut vector = Self::new();
        for (index, weight) in entries {
            vector.insert(index, weight)?;
        }
        Ok(vector)
    }

    /// Set the weight at a vocabulary index. Zero weights are dropped.
    pub fn insert(&mut self, index: u32, weight: f32) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(EngineError::invalid_argument(format!(
                "sparse weight at index {} must be finite and non-negative, got {}",
                index, weight
            )));
        }
        if weight > 0.0 {
            self.entries.insert(index, weight);
        }
        Ok(())
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// True if the vector has no non-zero entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest populated vocabulary index, if any
    pub fn max_index(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// Iterate over (index, weight) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.entries.iter().map(|(&i, &w)| (i, w))
    }

    /// Weight at a vocabulary index (0.0 if absent)
    pub fn get(&self, index: u32) -> f32 {
        self.entries.get(&index).copied().unwrap_or(0.0)
    }

    /// Inner product with another sparse vector.
    ///
    /// Both sides are non-negative, so the result is non-negative.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        // Walk the smaller map, probe the larger one
        let (small, large) = if self.nnz() <= other.nnz() {
            (&self.entries, &other.entries)
        } else {
            (&other.entries, &self.entries)
        };
        small
            .iter()
            .filter_map(|(index, &w)| large.get(index).map(|&v| w as f64 * v as f64))
            .sum()
    }

    /// Textual wire form used for query-time scoring: `{index:weight,...}/dim`
    /// with 1-based indices, matching the pgvector `sparsevec` input format.
    pub fn to_wire(&self, dim: usize) -> String {
        let body = self
            .entries
            .iter()
            .map(|(index, weight)| format!("{}:{}", index + 1, weight))
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{}}}/{}", body, dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_sorted_and_one_based() {
        let v = SparseVector::from_entries([(10, 0.25), (1, 0.5)]).unwrap();
        assert_eq!(v.to_wire(30522), "{2:0.5,11:0.25}/30522");
    }

    #[test]
    fn empty_wire_format() {
        let v = SparseVector::new();
        assert_eq!(v.to_wire(8), "{}/8");
    }

    #[test]
    fn dot_product_over_shared_indices() {
        let a = SparseVector::from_entries([(1, 2.0), (5, 1.0)]).unwrap();
        let b = SparseVector::from_entries([(1, 3.0), (7, 4.0)]).unwrap();
        assert_eq!(a.dot(&b), 6.0);
        assert_eq!(b.dot(&a), 6.0);
    }

    #[test]
    fn disjoint_vectors_have_zero_dot() {
        let a = SparseVector::from_entries([(1, 2.0)]).unwrap();
        let b = SparseVector::from_entries([(2, 3.0)]).unwrap();
        assert_eq!(a.dot(&b), 0.0);
    }

    #[test]
    fn zero_weights_are_dropped() {
        let v = SparseVector::from_entries([(3, 0.0), (4, 1.0)]).unwrap();
        assert_eq!(v.nnz(), 1);
        assert_eq!(v.max_index(), Some(4));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let err = SparseVector::from_entries([(3, -0.1)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
    }
}
