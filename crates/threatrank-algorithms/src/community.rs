//! Community detection algorithms
//!
//! - Weakly connected components (union-find), used for connectivity checks
//! - Louvain modularity optimization
//!
//! ## Modularity
//!
//! Q = Σ_c [ in_c / 2m − (tot_c / 2m)² ]
//!
//! Where:
//! - in_c = weight of edges inside community c (each edge counted from both ends)
//! - tot_c = sum of weighted degrees of the members of c
//! - m = total edge weight of the symmetrized graph

use super::common::{GraphView, NodeId};
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use tracing::debug;

/// Result of WCC algorithm
pub struct WccResult {
    /// Map of Component ID -> List of NodeIds
    pub components: HashMap<usize, Vec<NodeId>>,
    /// Map of NodeId -> Component ID
    pub node_component: HashMap<NodeId, usize>,
}

impl WccResult {
    /// Number of components found
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Union-Find data structure
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, i: usize, j: usize) {
        let root_i = self.find(i);
        let root_j = self.find(j);

        if root_i != root_j {
            if self.rank[root_i] < self.rank[root_j] {
                self.parent[root_i] = root_j;
            } else if self.rank[root_i] > self.rank[root_j] {
                self.parent[root_j] = root_i;
            } else {
                self.parent[root_j] = root_i;
                self.rank[root_i] += 1;
            }
        }
    }
}

/// Weakly Connected Components (WCC)
///
/// Finds all disjoint subgraphs in the graph.
/// Ignores edge direction.
pub fn weakly_connected_components(view: &GraphView) -> WccResult {
    let n = view.node_count;
    let mut uf = UnionFind::new(n);

    for u_idx in 0..n {
        for &v_idx in view.successors(u_idx) {
            uf.union(u_idx, v_idx);
        }
    }

    let mut components = HashMap::new();
    let mut node_component = HashMap::new();

    for i in 0..n {
        let root = uf.find(i);
        let node_id = view.index_to_node[i];

        components.entry(root).or_insert_with(Vec::new).push(node_id);
        node_component.insert(node_id, root);
    }

    WccResult {
        components,
        node_component,
    }
}

/// Louvain configuration
#[derive(Debug, Clone)]
pub struct LouvainConfig {
    /// Minimum modularity gain for another aggregation level
    pub tolerance: f64,
    /// Cap on local-moving passes per level
    pub max_passes: usize,
    /// Cap on aggregation levels
    pub max_levels: usize,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_passes: 10,
            max_levels: 10,
        }
    }
}

/// Result of Louvain community detection
#[derive(Debug, Clone, Default)]
pub struct LouvainResult {
    /// Map of NodeId -> community label
    pub node_community: HashMap<NodeId, usize>,
    /// Map of community label -> member NodeIds (ascending index order)
    pub communities: HashMap<usize, Vec<NodeId>>,
    /// Modularity of the final partition
    pub modularity: f64,
    /// Aggregation levels performed
    pub levels: usize,
    /// False when a pass or level cap stopped the optimization
    pub converged: bool,
}

/// Gains closer than this are treated as equal
const GAIN_EPSILON: f64 = 1e-10;

/// Symmetric weighted graph used by Louvain levels
struct WeightedGraph {
    /// Neighbor rows sorted by index, no self entries
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Internal weight carried by each (super-)node
    self_loops: Vec<f64>,
    /// Weighted degree including the self-loop weight
    degree: Vec<f64>,
    /// Sum of degrees (2m)
    total: f64,
}

impl WeightedGraph {
    fn from_view(view: &GraphView) -> Self {
        let n = view.node_count;
        let mut rows: Vec<FxHashMap<usize, f64>> = vec![FxHashMap::default(); n];

        for u in 0..n {
            for (v, w) in view.out_edges(u) {
                if u == v {
                    continue;
                }
                *rows[u].entry(v).or_insert(0.0) += w;
                *rows[v].entry(u).or_insert(0.0) += w;
            }
        }

        Self::from_rows(rows, vec![0.0; n])
    }

    fn from_rows(rows: Vec<FxHashMap<usize, f64>>, self_loops: Vec<f64>) -> Self {
        let adjacency: Vec<Vec<(usize, f64)>> = rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<(usize, f64)> = row.into_iter().collect();
                row.sort_unstable_by_key(|&(v, _)| v);
                row
            })
            .collect();

        let degree: Vec<f64> = adjacency
            .iter()
            .zip(self_loops.iter())
            .map(|(row, loop_w)| row.iter().map(|&(_, w)| w).sum::<f64>() + loop_w)
            .collect();
        let total = degree.iter().sum();

        Self {
            adjacency,
            self_loops,
            degree,
            total,
        }
    }

    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Collapse each community into one super-node
    fn aggregate(&self, labels: &[usize], community_count: usize) -> Self {
        let mut rows: Vec<FxHashMap<usize, f64>> = vec![FxHashMap::default(); community_count];
        let mut self_loops = vec![0.0; community_count];

        for (i, row) in self.adjacency.iter().enumerate() {
            let c = labels[i];
            self_loops[c] += self.self_loops[i];
            for &(j, w) in row {
                let d = labels[j];
                if c == d {
                    self_loops[c] += w;
                } else {
                    *rows[c].entry(d).or_insert(0.0) += w;
                }
            }
        }

        Self::from_rows(rows, self_loops)
    }

    fn modularity(&self, labels: &[usize]) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }

        let mut inner: FxHashMap<usize, f64> = FxHashMap::default();
        let mut totals: FxHashMap<usize, f64> = FxHashMap::default();

        for (i, row) in self.adjacency.iter().enumerate() {
            let c = labels[i];
            *totals.entry(c).or_insert(0.0) += self.degree[i];
            let internal: f64 = row
                .iter()
                .filter(|&&(j, _)| labels[j] == c)
                .map(|&(_, w)| w)
                .sum();
            *inner.entry(c).or_insert(0.0) += internal + self.self_loops[i];
        }

        totals
            .iter()
            .map(|(c, &tot)| {
                let in_c = inner.get(c).copied().unwrap_or(0.0);
                in_c / self.total - (tot / self.total).powi(2)
            })
            .sum()
    }

    /// Local moving phase.
    ///
    /// Nodes are visited in index order. The gain of joining community C is
    /// ΔQ·m = k_i,in(C) − Σ_tot(C)·k_i / 2m, with the node already removed
    /// from its own community. Among candidates with equal gain the lowest
    /// community id wins. The winner must still beat the gain of staying:
    /// a node whose own community ties the best candidate does not move,
    /// even when the candidate has a lower id.
    ///
    /// Returns the labels and whether the pass cap cut the phase short, or
    /// `None` when `should_stop` fired before a pass.
    fn local_moving<F>(&self, max_passes: usize, should_stop: &F) -> Option<(Vec<usize>, bool)>
    where
        F: Fn() -> bool,
    {
        let n = self.node_count();
        let two_m = self.total;

        let mut labels: Vec<usize> = (0..n).collect();
        let mut tot = self.degree.clone();

        // Scratch buffer: weight from the current node to each community
        let mut to_community = vec![0.0f64; n];
        let mut touched: Vec<usize> = Vec::new();

        let mut capped = true;
        for pass in 0..max_passes {
            if should_stop() {
                return None;
            }
            let mut moved = 0usize;

            for i in 0..n {
                let k_i = self.degree[i];
                let own = labels[i];

                for &(j, w) in &self.adjacency[i] {
                    let c = labels[j];
                    if to_community[c] == 0.0 {
                        touched.push(c);
                    }
                    to_community[c] += w;
                }

                tot[own] -= k_i;

                let gain = |c: usize| to_community[c] - tot[c] * k_i / two_m;
                let stay_gain = gain(own);

                touched.sort_unstable();
                touched.dedup();

                let mut best = own;
                let mut best_gain = 0.0;
                for &c in &touched {
                    if c == own {
                        continue;
                    }
                    let g = gain(c);
                    // Ascending scan keeps the lowest id on equal gains
                    if g > best_gain + GAIN_EPSILON {
                        best = c;
                        best_gain = g;
                    }
                }

                let target = if best != own && best_gain > stay_gain + GAIN_EPSILON {
                    best
                } else {
                    own
                };

                tot[target] += k_i;
                if target != own {
                    labels[i] = target;
                    moved += 1;
                }

                for &c in &touched {
                    to_community[c] = 0.0;
                }
                touched.clear();
            }

            debug!(pass, moved, "louvain local moving pass");
            if moved == 0 {
                capped = false;
                break;
            }
        }

        Some((labels, capped))
    }
}

/// Relabel to 0..k in order of first appearance
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: FxHashMap<usize, usize> = FxHashMap::default();
    let relabeled = labels
        .iter()
        .map(|&c| {
            let next = mapping.len();
            *mapping.entry(c).or_insert(next)
        })
        .collect();
    (relabeled, mapping.len())
}

/// Louvain community detection.
///
/// Edge direction is ignored; weights of opposite edges are summed. The
/// partition is deterministic for a given view and configuration.
pub fn louvain(view: &GraphView, config: &LouvainConfig) -> LouvainResult {
    louvain_with_interrupt(view, config, || false).unwrap_or_default()
}

/// Louvain, polling `should_stop` before every local-moving pass and
/// aggregation level. Returns `None` when the callback fired.
pub fn louvain_with_interrupt<F>(
    view: &GraphView,
    config: &LouvainConfig,
    should_stop: F,
) -> Option<LouvainResult>
where
    F: Fn() -> bool,
{
    let n = view.node_count;
    let mut graph = WeightedGraph::from_view(view);
    let mut membership: Vec<usize> = (0..n).collect();

    let mut levels = 0;
    let mut converged = true;
    let mut modularity = graph.modularity(&membership);

    if graph.total > 0.0 {
        converged = false;
        while levels < config.max_levels {
            if should_stop() {
                debug!(levels, "louvain interrupted");
                return None;
            }
            let Some((labels, capped)) = graph.local_moving(config.max_passes, &should_stop) else {
                debug!(levels, "louvain interrupted");
                return None;
            };
            levels += 1;

            let (labels, community_count) = renumber(&labels);
            let level_modularity = graph.modularity(&labels);
            let gain = level_modularity - modularity;

            for m in membership.iter_mut() {
                *m = labels[*m];
            }
            modularity = level_modularity;

            debug!(level = levels, communities = community_count, modularity, gain, "louvain level");

            if community_count == graph.node_count() || gain < config.tolerance {
                converged = !capped;
                break;
            }

            graph = graph.aggregate(&labels, community_count);
        }
    }

    let (membership, _) = renumber(&membership);

    let mut node_community = HashMap::with_capacity(n);
    let mut communities: HashMap<usize, Vec<NodeId>> = HashMap::new();
    for (idx, &c) in membership.iter().enumerate() {
        let node_id = view.index_to_node[idx];
        node_community.insert(node_id, c);
        communities.entry(c).or_default().push(node_id);
    }

    Some(LouvainResult {
        node_community,
        communities,
        modularity,
        levels,
        converged,
    })
}

/// Modularity of an arbitrary partition of the view (direction ignored)
pub fn modularity(view: &GraphView, partition: &HashMap<NodeId, usize>) -> f64 {
    let graph = WeightedGraph::from_view(view);
    let labels: Vec<usize> = view
        .index_to_node
        .iter()
        .enumerate()
        .map(|(idx, id)| partition.get(id).copied().unwrap_or(usize::MAX - idx))
        .collect();
    graph.modularity(&labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> GraphView {
        // {0,1,2} and {3,4,5} joined by the bridge 2 - 3
        GraphView::from_edges(
            (0..6).collect(),
            &[
                (0, 1, 1.0),
                (1, 2, 1.0),
                (2, 0, 1.0),
                (3, 4, 1.0),
                (4, 5, 1.0),
                (5, 3, 1.0),
                (2, 3, 1.0),
            ],
            false,
        )
    }

    #[test]
    fn test_wcc() {
        // 1->2, 3->4->5, 6 isolated
        let view = GraphView::from_edges(
            vec![1, 2, 3, 4, 5, 6],
            &[(0, 1, 1.0), (2, 3, 1.0), (3, 4, 1.0)],
            false,
        );

        let result = weakly_connected_components(&view);

        assert_eq!(result.component_count(), 3);

        let c1 = result.node_component[&1];
        let c2 = result.node_component[&2];
        assert_eq!(c1, c2);

        let c3 = result.node_component[&3];
        let c4 = result.node_component[&4];
        let c5 = result.node_component[&5];
        assert_eq!(c3, c4);
        assert_eq!(c4, c5);
        assert_ne!(c1, c3);
    }

    #[test]
    fn test_louvain_splits_two_triangles() {
        let result = louvain(&two_triangles(), &LouvainConfig::default());

        assert_eq!(result.communities.len(), 2);
        let c = &result.node_community;
        assert_eq!(c[&0], c[&1]);
        assert_eq!(c[&1], c[&2]);
        assert_eq!(c[&3], c[&4]);
        assert_eq!(c[&4], c[&5]);
        assert_ne!(c[&0], c[&3]);

        // Labels follow the lowest member index
        assert_eq!(c[&0], 0);
        assert_eq!(c[&3], 1);

        // 2 * (6/14 - (7/14)^2)
        let expected = 2.0 * (6.0 / 14.0 - 0.25);
        assert!((result.modularity - expected).abs() < 1e-12);
        assert!(result.converged);
    }

    #[test]
    fn test_louvain_is_deterministic() {
        let view = two_triangles();
        let first = louvain(&view, &LouvainConfig::default());
        let second = louvain(&view, &LouvainConfig::default());
        assert_eq!(first.node_community, second.node_community);
        assert_eq!(first.levels, second.levels);
    }

    #[test]
    fn test_louvain_without_edges() {
        let view = GraphView::from_edges(vec![7, 8, 9], &[], false);
        let result = louvain(&view, &LouvainConfig::default());

        assert_eq!(result.communities.len(), 3);
        assert_eq!(result.levels, 0);
        assert_eq!(result.modularity, 0.0);
        assert!(result.converged);
    }

    #[test]
    fn test_louvain_separates_components() {
        // Two disjoint edges
        let view = GraphView::from_edges(vec![0, 1, 2, 3], &[(0, 1, 1.0), (2, 3, 1.0)], false);
        let result = louvain(&view, &LouvainConfig::default());
        let c = &result.node_community;
        assert_eq!(c[&0], c[&1]);
        assert_eq!(c[&2], c[&3]);
        assert_ne!(c[&0], c[&2]);
    }

    #[test]
    fn test_local_moving_tie_break() {
        // 4-cycle 0-1-2-3-0, every degree 2
        let view = GraphView::from_edges(
            (0..4).collect(),
            &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 0, 1.0)],
            false,
        );
        let graph = WeightedGraph::from_view(&view);
        let (labels, _) = graph.local_moving(1, &|| false).unwrap();

        // 0 gains equally towards 1 and 3 and joins the lower id.
        // 1 and 3 tie with their own community and stay.
        assert_eq!(labels, vec![1, 1, 3, 3]);
    }

    #[test]
    fn test_louvain_interrupt() {
        let view = two_triangles();
        let polls = std::cell::Cell::new(0);
        let result = louvain_with_interrupt(&view, &LouvainConfig::default(), || {
            polls.set(polls.get() + 1);
            polls.get() > 1
        });
        assert!(result.is_none());

        let full = louvain_with_interrupt(&view, &LouvainConfig::default(), || false);
        assert_eq!(full.map(|r| r.communities.len()), Some(2));
    }

    #[test]
    fn test_modularity_of_given_partition() {
        let view = two_triangles();
        let partition: HashMap<NodeId, usize> =
            [(0, 0), (1, 0), (2, 0), (3, 1), (4, 1), (5, 1)].into_iter().collect();
        let q = modularity(&view, &partition);
        assert!((q - 2.0 * (6.0 / 14.0 - 0.25)).abs() < 1e-12);

        let single: HashMap<NodeId, usize> = (0..6).map(|i| (i, 0)).collect();
        assert!(modularity(&view, &single).abs() < 1e-12);
    }
}
