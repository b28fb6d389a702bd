//! PageRank algorithm implementation
//!
//! Power iteration over the directed, weighted view. Ranks start at 1.0 per
//! node so that the total stays close to the node count.

use super::common::{GraphView, NodeId};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// PageRank configuration
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    /// Damping factor (usually 0.85)
    pub damping_factor: f64,
    /// Hard cap on the number of iterations
    pub iterations: usize,
    /// Convergence tolerance on the L1 norm of the rank delta
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            iterations: 20,
            tolerance: 1e-6,
        }
    }
}

/// Result of a PageRank run
#[derive(Debug, Clone, Default)]
pub struct PageRankResult {
    /// Map of NodeId -> rank
    pub scores: HashMap<NodeId, f64>,
    /// Iterations actually performed
    pub iterations: usize,
    /// Whether the tolerance was met before the iteration cap
    pub converged: bool,
    /// L1 delta of the last iteration
    pub delta: f64,
}

/// Calculate PageRank for the graph view
///
/// Rank flowing out of a node is split proportionally to edge weight.
/// Nodes without outgoing weight (dangling) spread their rank uniformly over
/// every node each iteration, which keeps the rank sum at roughly `n`.
pub fn page_rank(view: &GraphView, config: &PageRankConfig) -> PageRankResult {
    page_rank_with_interrupt(view, config, || false).unwrap_or_default()
}

/// PageRank, polling `should_stop` before every iteration.
///
/// Returns `None` when the callback fired.
pub fn page_rank_with_interrupt<F>(
    view: &GraphView,
    config: &PageRankConfig,
    should_stop: F,
) -> Option<PageRankResult>
where
    F: Fn() -> bool,
{
    let n = view.node_count;

    if n == 0 {
        return Some(PageRankResult {
            scores: HashMap::new(),
            iterations: 0,
            converged: true,
            delta: 0.0,
        });
    }

    let out_weight: Vec<f64> = (0..n).map(|i| view.out_weight(i)).collect();
    let dangling: Vec<usize> = (0..n).filter(|&i| out_weight[i] <= 0.0).collect();

    let mut scores = vec![1.0; n];
    let mut next_scores = vec![0.0; n];

    let d = config.damping_factor;
    let base_score = 1.0 - d;

    let mut iterations = 0;
    let mut converged = false;
    let mut delta = f64::INFINITY;

    while iterations < config.iterations {
        if should_stop() {
            debug!(iterations, "pagerank interrupted");
            return None;
        }
        iterations += 1;

        let dangling_mass: f64 = dangling.iter().map(|&i| scores[i]).sum();
        let dangling_share = dangling_mass / n as f64;

        let prev = &scores;
        next_scores.par_iter_mut().enumerate().for_each(|(i, next)| {
            let mut sum_incoming = 0.0;
            for (source_idx, w) in view.in_edges(i) {
                let total = out_weight[source_idx];
                if total > 0.0 {
                    sum_incoming += prev[source_idx] * w / total;
                }
            }
            *next = base_score + d * (sum_incoming + dangling_share);
        });

        delta = scores
            .iter()
            .zip(next_scores.iter())
            .map(|(old, new)| (new - old).abs())
            .sum();

        std::mem::swap(&mut scores, &mut next_scores);

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    debug!(iterations, converged, delta, "pagerank finished");

    let scores = scores
        .into_iter()
        .enumerate()
        .map(|(idx, score)| (view.index_to_node[idx], score))
        .collect();

    Some(PageRankResult {
        scores,
        iterations,
        converged,
        delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle_view(n: usize) -> GraphView {
        let edges: Vec<(usize, usize, f64)> = (0..n).map(|i| (i, (i + 1) % n, 1.0)).collect();
        GraphView::from_edges((0..n as u64).collect(), &edges, false)
    }

    #[test]
    fn test_pagerank_star() {
        // Center (0) points to leaves (1, 2); leaves point back
        let view = GraphView::from_edges(
            vec![0, 1, 2],
            &[(0, 1, 1.0), (0, 2, 1.0), (1, 0, 1.0), (2, 0, 1.0)],
            false,
        );
        let result = page_rank(&view, &PageRankConfig::default());

        assert!(result.scores[&0] > result.scores[&1]);
        assert!((result.scores[&1] - result.scores[&2]).abs() < 1e-9);
    }

    #[test]
    fn test_rank_sum_is_conserved_on_cycle() {
        let view = cycle_view(5);
        let result = page_rank(&view, &PageRankConfig::default());
        let total: f64 = result.scores.values().sum();
        assert!((total - 5.0).abs() < 1e-6, "sum was {}", total);
        assert!(result.converged);
    }

    #[test]
    fn test_dangling_nodes_redistribute_rank() {
        // 0 -> 1, 1 has no outgoing edges
        let view = GraphView::from_edges(vec![0, 1], &[(0, 1, 1.0)], false);
        let config = PageRankConfig {
            iterations: 100,
            ..Default::default()
        };
        let result = page_rank(&view, &config);
        let total: f64 = result.scores.values().sum();
        assert!((total - 2.0).abs() < 1e-4, "sum was {}", total);
        assert!(result.scores[&1] > result.scores[&0]);
    }

    #[test]
    fn test_weights_shift_rank() {
        // 0 -> 1 (heavy), 0 -> 2 (light), both point back to 0
        let view = GraphView::from_edges(
            vec![0, 1, 2],
            &[(0, 1, 9.0), (0, 2, 1.0), (1, 0, 1.0), (2, 0, 1.0)],
            true,
        );
        let result = page_rank(&view, &PageRankConfig::default());
        assert!(result.scores[&1] > result.scores[&2]);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let view = GraphView::from_edges(vec![0, 1], &[(0, 1, 1.0)], false);
        let config = PageRankConfig {
            iterations: 1,
            tolerance: 1e-12,
            ..Default::default()
        };
        let result = page_rank(&view, &config);
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_interrupt_stops_iteration() {
        // Star: ranks oscillate towards the fixed point over many iterations
        let view = GraphView::from_edges(
            vec![0, 1, 2],
            &[(0, 1, 1.0), (0, 2, 1.0), (1, 0, 1.0), (2, 0, 1.0)],
            false,
        );
        let polls = std::cell::Cell::new(0);
        let result = page_rank_with_interrupt(&view, &PageRankConfig::default(), || {
            polls.set(polls.get() + 1);
            polls.get() > 2
        });
        assert!(result.is_none());
        assert_eq!(polls.get(), 3);

        let full = page_rank_with_interrupt(&view, &PageRankConfig::default(), || false);
        assert!(full.is_some_and(|r| r.iterations > 3));
    }

    #[test]
    fn test_empty_view() {
        let view = GraphView::from_edges(Vec::new(), &[], false);
        let result = page_rank(&view, &PageRankConfig::default());
        assert!(result.scores.is_empty());
        assert!(result.converged);
    }
}
