//! Offline ranking metrics for recommendation quality.
//!
//! These operate on a recommended id list against ground-truth relevance
//! and make no calls into the engine, so they can score any historical
//! result set.

use std::collections::{HashMap, HashSet};

use crate::models::ContentId;

/// Fraction of the k recommendation slots holding a relevant item.
///
/// The denominator is always `k`, so a list shorter than k is penalized
/// for the slots it left unfilled. Returns 0.0 when `k` is zero or no
/// recommendations were given.
pub fn precision_at_k(
    recommended: &[ContentId],
    relevant: &HashSet<ContentId>,
    k: usize,
) -> f64 {
    if k == 0 || recommended.is_empty() {
        return 0.0;
    }

    let top_k = &recommended[..recommended.len().min(k)];
    let hits = top_k.iter().filter(|id| relevant.contains(id)).count();
    hits as f64 / k as f64
}

/// Fraction of the relevant items that appear in the top-k recommendations.
///
/// Returns 0.0 when there are no relevant items to recover.
pub fn recall_at_k(
    recommended: &[ContentId],
    relevant: &HashSet<ContentId>,
    k: usize,
) -> f64 {
    if k == 0 || relevant.is_empty() {
        return 0.0;
    }

    let top_k = &recommended[..recommended.len().min(k)];
    let hits = top_k.iter().filter(|id| relevant.contains(id)).count();
    hits as f64 / relevant.len() as f64
}

/// Normalized discounted cumulative gain at k.
///
/// `relevance` maps content id to a graded relevance (missing ids count
/// as zero). The rank-0 term is undiscounted; later ranks are divided by
/// log2(rank + 1). Returns 0.0 when `k` is zero or the ideal DCG is zero
/// (no relevant items at all).
pub fn ndcg_at_k(
    recommended: &[ContentId],
    relevance: &HashMap<ContentId, f64>,
    k: usize,
) -> f64 {
    if k == 0 {
        return 0.0;
    }

    let dcg = dcg_at_k(
        recommended
            .iter()
            .map(|id| relevance.get(id).copied().unwrap_or(0.0)),
        k,
    );

    let mut ideal: Vec<f64> = relevance.values().copied().collect();
    ideal.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let idcg = dcg_at_k(ideal.into_iter(), k);

    if idcg > 0.0 {
        dcg / idcg
    } else {
        0.0
    }
}

fn dcg_at_k(gains: impl Iterator<Item = f64>, k: usize) -> f64 {
    gains
        .take(k)
        .enumerate()
        .map(|(rank, gain)| {
            if rank == 0 {
                gain
            } else {
                gain / ((rank + 1) as f64).log2()
            }
        })
        .sum()
}
