//! Shared utilities for graph algorithms
//!
//! Provides a read-only, optimized view of the graph topology for algorithm execution.

use std::collections::HashMap;

/// Node Identifier type (u64)
pub type NodeId = u64;

/// A dense, integer-indexed view of the graph topology using Compressed Sparse Row (CSR) format.
///
/// Both directions are materialized so that pull-style algorithms (PageRank)
/// and push-style traversals (Brandes) can walk their natural side without
/// searching the opposite list.
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index (0..N) back to NodeId
    pub index_to_node: Vec<NodeId>,
    /// Mapping from NodeId to dense index
    pub node_to_index: HashMap<NodeId, usize>,

    /// Outgoing edges CSR structure
    /// Offsets into `out_targets`. Size = node_count + 1
    pub out_offsets: Vec<usize>,
    /// Contiguous array of target node indices
    pub out_targets: Vec<usize>,

    /// Incoming edges CSR structure (Compressed Sparse Column effectively)
    /// Offsets into `in_sources`. Size = node_count + 1
    pub in_offsets: Vec<usize>,
    /// Contiguous array of source node indices
    pub in_sources: Vec<usize>,

    /// Edge weights: aligned with `out_targets`
    pub weights: Option<Vec<f64>>,
    /// Edge weights: aligned with `in_sources`
    pub in_weights: Option<Vec<f64>>,
}

impl GraphView {
    /// Build a view from a list of `(source_idx, target_idx, weight)` triples.
    ///
    /// `index_to_node[i]` is the external id of dense index `i`. Edge order is
    /// preserved within each adjacency row. When `weighted` is false the
    /// weights are dropped and every algorithm treats edges as weight 1.0.
    pub fn from_edges(
        index_to_node: Vec<NodeId>,
        edges: &[(usize, usize, f64)],
        weighted: bool,
    ) -> Self {
        let node_count = index_to_node.len();
        let node_to_index: HashMap<NodeId, usize> = index_to_node
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();

        let mut out_offsets = vec![0usize; node_count + 1];
        let mut in_offsets = vec![0usize; node_count + 1];
        for &(u, v, _) in edges {
            out_offsets[u + 1] += 1;
            in_offsets[v + 1] += 1;
        }
        for i in 0..node_count {
            out_offsets[i + 1] += out_offsets[i];
            in_offsets[i + 1] += in_offsets[i];
        }

        let mut out_targets = vec![0usize; edges.len()];
        let mut in_sources = vec![0usize; edges.len()];
        let mut out_w = vec![0.0f64; if weighted { edges.len() } else { 0 }];
        let mut in_w = vec![0.0f64; if weighted { edges.len() } else { 0 }];

        // Cursor per row, consumed left to right so row order matches edge order
        let mut out_cursor = out_offsets[..node_count].to_vec();
        let mut in_cursor = in_offsets[..node_count].to_vec();
        for &(u, v, w) in edges {
            let o = out_cursor[u];
            out_targets[o] = v;
            out_cursor[u] += 1;

            let i = in_cursor[v];
            in_sources[i] = u;
            in_cursor[v] += 1;

            if weighted {
                out_w[o] = w;
                in_w[i] = w;
            }
        }

        GraphView {
            node_count,
            index_to_node,
            node_to_index,
            out_offsets,
            out_targets,
            in_offsets,
            in_sources,
            weights: weighted.then_some(out_w),
            in_weights: weighted.then_some(in_w),
        }
    }

    /// Total number of directed edges
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    /// Whether the view carries edge weights
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// Get the out-degree of a node (by index)
    pub fn out_degree(&self, idx: usize) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    /// Get the in-degree of a node (by index)
    pub fn in_degree(&self, idx: usize) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Get outgoing neighbors (successors) of a node
    pub fn successors(&self, idx: usize) -> &[usize] {
        let start = self.out_offsets[idx];
        let end = self.out_offsets[idx + 1];
        &self.out_targets[start..end]
    }

    /// Get incoming neighbors (predecessors) of a node
    pub fn predecessors(&self, idx: usize) -> &[usize] {
        let start = self.in_offsets[idx];
        let end = self.in_offsets[idx + 1];
        &self.in_sources[start..end]
    }

    /// Get weights for outgoing edges of a node
    pub fn weights(&self, idx: usize) -> Option<&[f64]> {
        self.weights.as_ref().map(|w| {
            let start = self.out_offsets[idx];
            let end = self.out_offsets[idx + 1];
            &w[start..end]
        })
    }

    /// Get weights for incoming edges of a node
    pub fn in_weights(&self, idx: usize) -> Option<&[f64]> {
        self.in_weights.as_ref().map(|w| {
            let start = self.in_offsets[idx];
            let end = self.in_offsets[idx + 1];
            &w[start..end]
        })
    }

    /// Outgoing edges as `(target, weight)` pairs, weight 1.0 when unweighted
    pub fn out_edges(&self, idx: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let weights = self.weights(idx);
        self.successors(idx)
            .iter()
            .enumerate()
            .map(move |(i, &v)| (v, weights.map_or(1.0, |w| w[i])))
    }

    /// Incoming edges as `(source, weight)` pairs, weight 1.0 when unweighted
    pub fn in_edges(&self, idx: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let weights = self.in_weights(idx);
        self.predecessors(idx)
            .iter()
            .enumerate()
            .map(move |(i, &u)| (u, weights.map_or(1.0, |w| w[i])))
    }

    /// Sum of outgoing edge weights (out-degree when unweighted)
    pub fn out_weight(&self, idx: usize) -> f64 {
        match self.weights(idx) {
            Some(w) => w.iter().sum(),
            None => self.out_degree(idx) as f64,
        }
    }

    /// Distinct neighbors in either direction, sorted, excluding the node itself
    pub fn undirected_neighbors(&self, idx: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self
            .successors(idx)
            .iter()
            .chain(self.predecessors(idx).iter())
            .copied()
            .filter(|&n| n != idx)
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}
