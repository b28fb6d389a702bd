//! Node similarity (Jaccard over neighbor sets)
//!
//! Candidate pairs are enumerated through an inverted index
//! (neighbor -> nodes adjacent to it), so only pairs that share at least one
//! neighbor are ever scored.

use super::common::{GraphView, NodeId};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tracing::debug;

/// Similarity configuration
#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    /// Number of most similar nodes kept per node
    pub top_k: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

/// Result of node similarity
#[derive(Debug, Clone, Default)]
pub struct SimilarityResult {
    /// Map of NodeId -> most similar nodes, best first.
    /// Nodes without any similar peer are absent.
    pub neighbors: HashMap<NodeId, Vec<(NodeId, f64)>>,
}

impl SimilarityResult {
    /// Similarity of a pair if it made it into `a`'s top-K
    pub fn score(&self, a: NodeId, b: NodeId) -> Option<f64> {
        self.neighbors
            .get(&a)?
            .iter()
            .find(|(id, _)| *id == b)
            .map(|(_, score)| *score)
    }
}

/// Jaccard similarity of two sorted, deduplicated index slices
pub fn jaccard(a: &[usize], b: &[usize]) -> f64 {
    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let union = a.len() + b.len() - shared;
    if union == 0 {
        0.0
    } else {
        shared as f64 / union as f64
    }
}

/// Top-K Jaccard neighbors for every node.
///
/// Neighbor sets ignore edge direction. When `groups` is given, only nodes
/// with the same group value are compared (e.g. same node type).
pub fn node_similarity(
    view: &GraphView,
    groups: Option<&[usize]>,
    config: &SimilarityConfig,
) -> SimilarityResult {
    node_similarity_with_interrupt(view, groups, config, || false).unwrap_or_default()
}

/// Top-K Jaccard neighbors, polling `should_stop` before each node.
///
/// Returns `None` when the callback fired; partial lists are dropped.
pub fn node_similarity_with_interrupt<F>(
    view: &GraphView,
    groups: Option<&[usize]>,
    config: &SimilarityConfig,
    should_stop: F,
) -> Option<SimilarityResult>
where
    F: Fn() -> bool + Sync,
{
    let n = view.node_count;
    if n == 0 || config.top_k == 0 {
        return Some(SimilarityResult::default());
    }

    let neighbor_sets: Vec<Vec<usize>> = (0..n).map(|i| view.undirected_neighbors(i)).collect();

    let mut inverted: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (node, neighbors) in neighbor_sets.iter().enumerate() {
        for &x in neighbors {
            inverted[x].push(node);
        }
    }

    let same_group = |a: usize, b: usize| groups.map_or(true, |g| g[a] == g[b]);

    let stopped = AtomicBool::new(false);
    let keep_going = || {
        if stopped.load(AtomicOrdering::Relaxed) {
            return false;
        }
        if should_stop() {
            stopped.store(true, AtomicOrdering::Relaxed);
            return false;
        }
        true
    };

    let neighbors: HashMap<NodeId, Vec<(NodeId, f64)>> = (0..n)
        .into_par_iter()
        .filter_map(|a| {
            if !keep_going() {
                return None;
            }
            let mut shared: FxHashMap<usize, usize> = FxHashMap::default();
            for &x in &neighbor_sets[a] {
                for &b in &inverted[x] {
                    if b != a && same_group(a, b) {
                        *shared.entry(b).or_insert(0) += 1;
                    }
                }
            }
            if shared.is_empty() {
                return None;
            }

            let size_a = neighbor_sets[a].len();
            let mut scored: Vec<(NodeId, f64)> = shared
                .into_iter()
                .map(|(b, common)| {
                    let union = size_a + neighbor_sets[b].len() - common;
                    (view.index_to_node[b], common as f64 / union as f64)
                })
                .collect();

            scored.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));
            scored.truncate(config.top_k);

            Some((view.index_to_node[a], scored))
        })
        .collect();

    if stopped.load(AtomicOrdering::Relaxed) {
        debug!("similarity interrupted");
        return None;
    }

    Some(SimilarityResult { neighbors })
}
