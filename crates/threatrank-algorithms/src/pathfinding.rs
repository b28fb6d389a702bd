//! Single-source shortest path DAGs
//!
//! BFS (unweighted) and Dijkstra (weighted) variants that record, for every
//! reached node, its shortest-path predecessors and the number of shortest
//! paths from the source. These are the building blocks of Brandes'
//! betweenness accumulation.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

/// Adjacency row: `(neighbor, weight)` pairs
pub type AdjacencyList = Vec<Vec<(usize, f64)>>;

/// State for Dijkstra priority queue
#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    node_idx: usize,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare costs reversed for min-heap, lowest index first on ties
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node_idx.cmp(&self.node_idx))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-path DAG rooted at one source.
///
/// The buffers are sized once and reset between sources so a worker can
/// reuse one instance for many traversals.
pub struct ShortestPathDag {
    /// Reached nodes in non-decreasing distance order
    pub stack: Vec<usize>,
    /// Shortest-path predecessors per node
    pub preds: Vec<Vec<usize>>,
    /// Number of shortest paths from the source per node
    pub sigma: Vec<f64>,
    /// Distance from the source per node (infinite when unreached)
    pub dist: Vec<f64>,
    settled: Vec<bool>,
    queue: VecDeque<usize>,
    heap: BinaryHeap<State>,
}

impl ShortestPathDag {
    pub fn new(node_count: usize) -> Self {
        Self {
            stack: Vec::with_capacity(node_count),
            preds: vec![Vec::new(); node_count],
            sigma: vec![0.0; node_count],
            dist: vec![f64::INFINITY; node_count],
            settled: vec![false; node_count],
            queue: VecDeque::new(),
            heap: BinaryHeap::new(),
        }
    }

    /// Clear entries touched by the previous traversal
    fn reset(&mut self) {
        for &v in &self.stack {
            self.preds[v].clear();
            self.sigma[v] = 0.0;
            self.dist[v] = f64::INFINITY;
            self.settled[v] = false;
        }
        self.stack.clear();
        self.queue.clear();
        self.heap.clear();
    }

    /// Breadth-first traversal (every edge has length 1)
    pub fn bfs(&mut self, adjacency: &AdjacencyList, source: usize) {
        self.reset();

        self.dist[source] = 0.0;
        self.sigma[source] = 1.0;
        self.queue.push_back(source);

        while let Some(v) = self.queue.pop_front() {
            self.stack.push(v);
            let next_dist = self.dist[v] + 1.0;

            for &(w, _) in &adjacency[v] {
                if self.dist[w].is_infinite() {
                    self.dist[w] = next_dist;
                    self.queue.push_back(w);
                }
                if self.dist[w] == next_dist {
                    self.sigma[w] += self.sigma[v];
                    self.preds[w].push(v);
                }
            }
        }
    }

    /// Dijkstra traversal using edge weights as lengths.
    ///
    /// Edges with a non-positive or non-finite weight are skipped.
    pub fn dijkstra(&mut self, adjacency: &AdjacencyList, source: usize) {
        self.reset();

        self.dist[source] = 0.0;
        self.sigma[source] = 1.0;
        self.heap.push(State { cost: 0.0, node_idx: source });

        while let Some(State { cost, node_idx: v }) = self.heap.pop() {
            if self.settled[v] || cost > self.dist[v] {
                continue;
            }
            self.settled[v] = true;
            self.stack.push(v);

            for &(w, weight) in &adjacency[v] {
                if !(weight > 0.0 && weight.is_finite()) || self.settled[w] {
                    continue;
                }

                let next_cost = cost + weight;
                let current = self.dist[w];

                // Every tentatively reached node is settled later, so reset() sees it
                if current.is_infinite() || (next_cost < current && !same_length(next_cost, current)) {
                    self.dist[w] = next_cost;
                    self.sigma[w] = self.sigma[v];
                    self.preds[w].clear();
                    self.preds[w].push(v);
                    self.heap.push(State { cost: next_cost, node_idx: w });
                } else if same_length(next_cost, current) {
                    self.sigma[w] += self.sigma[v];
                    self.preds[w].push(v);
                }
            }
        }
    }
}

/// Float equality for path lengths, relative to the magnitude
fn same_length(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfs_counts_shortest_paths() {
        // Diamond: 0 -> 1 -> 3, 0 -> 2 -> 3
        let adjacency: AdjacencyList = vec![
            vec![(1, 1.0), (2, 1.0)],
            vec![(3, 1.0)],
            vec![(3, 1.0)],
            vec![],
        ];
        let mut dag = ShortestPathDag::new(4);
        dag.bfs(&adjacency, 0);

        assert_eq!(dag.stack, vec![0, 1, 2, 3]);
        assert_eq!(dag.sigma[3], 2.0);
        assert_eq!(dag.preds[3], vec![1, 2]);
        assert_eq!(dag.dist[3], 2.0);
    }

    #[test]
    fn test_dijkstra_prefers_cheaper_path() {
        // 0 -> 1 (10), 1 -> 2 (5), 0 -> 2 (50)
        let adjacency: AdjacencyList = vec![vec![(1, 10.0), (2, 50.0)], vec![(2, 5.0)], vec![]];
        let mut dag = ShortestPathDag::new(3);
        dag.dijkstra(&adjacency, 0);

        assert_eq!(dag.dist[2], 15.0);
        assert_eq!(dag.preds[2], vec![1]);
        assert_eq!(dag.sigma[2], 1.0);
    }

    #[test]
    fn test_dijkstra_counts_equal_length_paths() {
        // Two paths of length 3 into node 3
        let adjacency: AdjacencyList = vec![
            vec![(1, 1.0), (2, 2.0)],
            vec![(3, 2.0)],
            vec![(3, 1.0)],
            vec![],
        ];
        let mut dag = ShortestPathDag::new(4);
        dag.dijkstra(&adjacency, 0);

        assert_eq!(dag.dist[3], 3.0);
        assert_eq!(dag.sigma[3], 2.0);
    }

    #[test]
    fn test_reuse_resets_state() {
        let adjacency: AdjacencyList = vec![vec![(1, 1.0)], vec![(2, 1.0)], vec![]];
        let mut dag = ShortestPathDag::new(3);
        dag.bfs(&adjacency, 0);
        dag.bfs(&adjacency, 2);

        assert_eq!(dag.stack, vec![2]);
        assert!(dag.dist[0].is_infinite());
        assert_eq!(dag.sigma[1], 0.0);
    }
}
