//! Betweenness centrality (Brandes)
//!
//! For every source node, a shortest-path DAG is built (BFS, or Dijkstra when
//! weighted) and pair dependencies are back-propagated from the farthest node
//! towards the source. Sources are independent, so they are spread across the
//! rayon pool, each worker owning its own accumulator; the partial vectors are
//! summed at the end.
//!
//! Raw scores grow with the number of node pairs in the graph. They rank
//! nodes within one run and are not comparable across graphs of different
//! sizes unless `normalized` is set.

use super::common::{GraphView, NodeId};
use super::pathfinding::{AdjacencyList, ShortestPathDag};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Betweenness configuration
#[derive(Debug, Clone)]
pub struct BetweennessConfig {
    /// Use edge weights as path lengths (Dijkstra). Ignored for unweighted views.
    pub weighted: bool,
    /// Follow edge direction. When false every edge is walkable both ways.
    pub directed: bool,
    /// Scale by the number of ordered node pairs not including the node
    pub normalized: bool,
    /// Process sources on the rayon pool
    pub parallel: bool,
}

impl Default for BetweennessConfig {
    fn default() -> Self {
        Self {
            weighted: false,
            directed: true,
            normalized: false,
            parallel: true,
        }
    }
}

/// Result of betweenness centrality
#[derive(Debug, Clone, Default)]
pub struct BetweennessResult {
    /// Map of NodeId -> betweenness score
    pub scores: HashMap<NodeId, f64>,
}

/// Per-worker Brandes state
struct Accumulator {
    paths: ShortestPathDag,
    delta: Vec<f64>,
    centrality: Vec<f64>,
}

impl Accumulator {
    fn new(n: usize) -> Self {
        Self {
            paths: ShortestPathDag::new(n),
            delta: vec![0.0; n],
            centrality: vec![0.0; n],
        }
    }

    fn visit(&mut self, adjacency: &AdjacencyList, source: usize, weighted: bool) {
        if weighted {
            self.paths.dijkstra(adjacency, source);
        } else {
            self.paths.bfs(adjacency, source);
        }

        let paths = &self.paths;
        for &w in paths.stack.iter().rev() {
            let coefficient = (1.0 + self.delta[w]) / paths.sigma[w];
            for &v in &paths.preds[w] {
                self.delta[v] += paths.sigma[v] * coefficient;
            }
            if w != source {
                self.centrality[w] += self.delta[w];
            }
        }

        for &w in &paths.stack {
            self.delta[w] = 0.0;
        }
    }
}

/// Compute betweenness centrality for every node in the view
pub fn betweenness_centrality(view: &GraphView, config: &BetweennessConfig) -> BetweennessResult {
    betweenness_centrality_with_interrupt(view, config, || false).unwrap_or_default()
}

/// Compute betweenness centrality, polling `should_stop` before each source.
///
/// Returns `None` when the callback fired; partial sums are dropped.
pub fn betweenness_centrality_with_interrupt<F>(
    view: &GraphView,
    config: &BetweennessConfig,
    should_stop: F,
) -> Option<BetweennessResult>
where
    F: Fn() -> bool + Sync,
{
    let n = view.node_count;
    let adjacency = build_adjacency(view, config.directed);
    let weighted = config.weighted && view.is_weighted();
    let stopped = AtomicBool::new(false);

    let keep_going = || {
        if stopped.load(Ordering::Relaxed) {
            return false;
        }
        if should_stop() {
            stopped.store(true, Ordering::Relaxed);
            return false;
        }
        true
    };

    let mut centrality = if config.parallel {
        // Each fold split owns an O(n) accumulator; keep splits near a few per thread
        let min_len = (n / (rayon::current_num_threads() * 4)).max(1);
        (0..n)
            .into_par_iter()
            .with_min_len(min_len)
            .fold(
                || Accumulator::new(n),
                |mut acc, source| {
                    if keep_going() {
                        acc.visit(&adjacency, source, weighted);
                    }
                    acc
                },
            )
            .map(|acc| acc.centrality)
            .reduce(
                || vec![0.0; n],
                |mut left, right| {
                    for (l, r) in left.iter_mut().zip(right) {
                        *l += r;
                    }
                    left
                },
            )
    } else {
        let mut acc = Accumulator::new(n);
        for source in 0..n {
            if !keep_going() {
                break;
            }
            acc.visit(&adjacency, source, weighted);
        }
        acc.centrality
    };

    if stopped.load(Ordering::Relaxed) {
        debug!("betweenness interrupted");
        return None;
    }

    let scale = if config.normalized {
        if n > 2 {
            Some(1.0 / ((n - 1) * (n - 2)) as f64)
        } else {
            None
        }
    } else if !config.directed {
        // Each undirected pair was counted from both endpoints
        Some(0.5)
    } else {
        None
    };
    if let Some(scale) = scale {
        centrality.iter_mut().for_each(|c| *c *= scale);
    }

    debug!(nodes = n, weighted, directed = config.directed, "betweenness finished");

    let scores = centrality
        .into_iter()
        .enumerate()
        .map(|(idx, score)| (view.index_to_node[idx], score))
        .collect();

    Some(BetweennessResult { scores })
}

/// Collapse parallel edges (shortest length wins) and order rows by neighbor
/// index so traversal order does not depend on edge insertion order.
fn build_adjacency(view: &GraphView, directed: bool) -> AdjacencyList {
    (0..view.node_count)
        .map(|u| {
            let mut row: Vec<(usize, f64)> = if directed {
                view.out_edges(u).collect()
            } else {
                view.out_edges(u).chain(view.in_edges(u)).collect()
            };
            row.retain(|&(v, _)| v != u);
            row.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
            row.dedup_by_key(|entry| entry.0);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_view(directed_both_ways: bool) -> GraphView {
        // A(0) - B(1) - C(2) - D(3)
        let mut edges = vec![(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)];
        if directed_both_ways {
            edges.extend([(1, 0, 1.0), (2, 1, 1.0), (3, 2, 1.0)]);
        }
        GraphView::from_edges(vec![0, 1, 2, 3], &edges, false)
    }

    #[test]
    fn test_path_graph_directed() {
        let result = betweenness_centrality(&path_view(false), &BetweennessConfig::default());
        let s = &result.scores;

        assert_eq!(s[&0], 0.0);
        assert_eq!(s[&3], 0.0);
        assert_eq!(s[&1], s[&2]);
        assert!(s[&1] > s[&0]);
        assert_eq!(s[&1], 2.0);
    }

    #[test]
    fn test_path_graph_undirected() {
        let config = BetweennessConfig {
            directed: false,
            ..Default::default()
        };
        let result = betweenness_centrality(&path_view(true), &config);
        let s = &result.scores;

        assert_eq!(s[&0], 0.0);
        assert_eq!(s[&3], 0.0);
        assert!((s[&1] - 2.0).abs() < 1e-12);
        assert!((s[&2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut edges = Vec::new();
        for i in 0..12usize {
            edges.push((i, (i + 1) % 12, 1.0));
            edges.push((i, (i + 5) % 12, 1.0));
        }
        let view = GraphView::from_edges((0..12).collect(), &edges, false);

        let parallel = betweenness_centrality(&view, &BetweennessConfig::default());
        let sequential = betweenness_centrality(
            &view,
            &BetweennessConfig {
                parallel: false,
                ..Default::default()
            },
        );

        for (id, score) in &parallel.scores {
            assert!((score - sequential.scores[id]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parallel_chunks_cover_every_source() {
        // Many more sources than worker splits
        let n = 2_000usize;
        let mut edges = Vec::new();
        for i in 0..n {
            edges.push((i, (i + 1) % n, 1.0));
            edges.push((i, (i * 7 + 3) % n, 1.0));
        }
        let view = GraphView::from_edges((0..n as u64).collect(), &edges, false);

        let parallel = betweenness_centrality(&view, &BetweennessConfig::default());
        let sequential = betweenness_centrality(
            &view,
            &BetweennessConfig {
                parallel: false,
                ..Default::default()
            },
        );

        assert_eq!(parallel.scores.len(), n);
        for (id, score) in &sequential.scores {
            assert!((score - parallel.scores[id]).abs() < 1e-9 * score.max(1.0));
        }
    }

    #[test]
    fn test_weighted_avoids_expensive_edge() {
        // 0 -> 1 (1), 1 -> 2 (1), 0 -> 2 (10): the cheap route goes through 1
        let view = GraphView::from_edges(
            vec![0, 1, 2],
            &[(0, 1, 1.0), (1, 2, 1.0), (0, 2, 10.0)],
            true,
        );
        let weighted = betweenness_centrality(
            &view,
            &BetweennessConfig {
                weighted: true,
                ..Default::default()
            },
        );
        let hops = betweenness_centrality(&view, &BetweennessConfig::default());

        assert_eq!(weighted.scores[&1], 1.0);
        assert_eq!(hops.scores[&1], 0.0);
    }

    #[test]
    fn test_split_paths_share_credit() {
        // Diamond 0 -> {1, 2} -> 3: each middle node carries half of the 0 -> 3 pair
        let view = GraphView::from_edges(
            vec![0, 1, 2, 3],
            &[(0, 1, 1.0), (0, 2, 1.0), (1, 3, 1.0), (2, 3, 1.0)],
            false,
        );
        let result = betweenness_centrality(&view, &BetweennessConfig::default());
        assert!((result.scores[&1] - 0.5).abs() < 1e-12);
        assert!((result.scores[&2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_scores() {
        let config = BetweennessConfig {
            normalized: true,
            ..Default::default()
        };
        let result = betweenness_centrality(&path_view(false), &config);
        // 2 / ((4 - 1) * (4 - 2))
        assert!((result.scores[&1] - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_interrupt_discards_result() {
        let result =
            betweenness_centrality_with_interrupt(&path_view(false), &BetweennessConfig::default(), || true);
        assert!(result.is_none());
    }
}
