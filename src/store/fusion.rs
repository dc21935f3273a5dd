//! Score fusion shared by the in-memory backend and the SQL query shape.
//!
//! Fusion is a full outer union over the dense and sparse candidate sets: a
//! document found by only one signal still participates, scoring zero on the
//! side that missed it.

use std::collections::BTreeMap;

/// Fuse per-document dense and sparse scores into a single ranked list.
///
/// Output is sorted by fused score descending, ties broken by document id
/// ascending, and is deterministic for a given input.
pub fn fuse_scores(
    alpha: f64,
    dense: &BTreeMap<i64, f64>,
    sparse: &BTreeMap<i64, f64>,
) -> Vec<(i64, f64)> {
    let mut fused: BTreeMap<i64, f64> = BTreeMap::new();
    for (&doc_id, &score) in dense {
        *fused.entry(doc_id).or_insert(0.0) += alpha * score;
    }
    for (&doc_id, &score) in sparse {
        *fused.entry(doc_id).or_insert(0.0) += (1.0 - alpha) * score;
    }

    let mut ranked: Vec<(i64, f64)> = fused.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(i64, f64)]) -> BTreeMap<i64, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn union_keeps_single_signal_documents() {
        let dense = map(&[(1, 0.8)]);
        let sparse = map(&[(2, 0.5)]);
        let ranked = fuse_scores(0.6, &dense, &sparse);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
        assert!((ranked[0].1 - 0.48).abs() < 1e-9);
        assert_eq!(ranked[1].0, 2);
        assert!((ranked[1].1 - 0.2).abs() < 1e-9);
    }

    #[test]
    fn alpha_one_is_pure_dense() {
        let dense = map(&[(1, 0.9), (2, 0.3)]);
        let sparse = map(&[(2, 100.0), (3, 100.0)]);
        let ranked = fuse_scores(1.0, &dense, &sparse);
        // Sparse-only documents survive the union but score zero.
        assert_eq!(ranked[0], (1, 0.9));
        assert!((ranked[1].1 - 0.3).abs() < 1e-9);
        assert_eq!(ranked[2].1, 0.0);
    }

    #[test]
    fn alpha_zero_is_pure_sparse() {
        let dense = map(&[(1, 0.9)]);
        let sparse = map(&[(2, 4.0)]);
        let ranked = fuse_scores(0.0, &dense, &sparse);
        assert_eq!(ranked[0], (2, 4.0));
        assert_eq!(ranked[1].1, 0.0);
    }

    #[test]
    fn ties_break_by_ascending_document_id() {
        let dense = map(&[(7, 0.5), (3, 0.5)]);
        let sparse = BTreeMap::new();
        let ranked = fuse_scores(1.0, &dense, &sparse);
        assert_eq!(ranked[0].0, 3);
        assert_eq!(ranked[1].0, 7);
    }

    #[test]
    fn both_signals_sum() {
        let dense = map(&[(1, 1.0)]);
        let sparse = map(&[(1, 2.0)]);
        let ranked = fuse_scores(0.6, &dense, &sparse);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].1 - (0.6 + 0.4 * 2.0)).abs() < 1e-9);
    }
}
