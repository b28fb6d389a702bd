//! Graph projection builder
//!
//! Copies a typed subset of the source graph into an immutable, integer
//! indexed snapshot for one analytics run. The snapshot owns its nodes and
//! edges, so the source may change while a run is in progress.

use super::error::{AnalyticsError, AnalyticsResult};
use crate::graph::{GraphSource, Node, NodeKey, NodeType, RelationType, RetryPolicy, SourceError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use threatrank_algorithms::GraphView;
use tracing::{debug, info, warn};

/// How edge weights are derived when projecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Keep the stored weight
    #[default]
    Uniform,
    /// Scale AFFECTS edges by the source vulnerability's severity / 10
    SeverityWeighted,
}

/// Which part of the source graph to project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSpec {
    pub node_types: Vec<NodeType>,
    pub relation_types: Vec<RelationType>,
    pub weight_policy: WeightPolicy,
}

impl Default for ProjectionSpec {
    fn default() -> Self {
        Self {
            node_types: NodeType::ALL.to_vec(),
            relation_types: RelationType::ALL.to_vec(),
            weight_policy: WeightPolicy::Uniform,
        }
    }
}

impl ProjectionSpec {
    pub fn new(node_types: Vec<NodeType>, relation_types: Vec<RelationType>) -> Self {
        Self {
            node_types,
            relation_types,
            weight_policy: WeightPolicy::Uniform,
        }
    }

    pub fn with_weight_policy(mut self, weight_policy: WeightPolicy) -> Self {
        self.weight_policy = weight_policy;
        self
    }

    /// Every requested relation must connect requested node types
    pub fn validate(&self) -> AnalyticsResult<()> {
        for relation in &self.relation_types {
            for endpoint in [relation.source_type(), relation.target_type()] {
                if !self.node_types.contains(&endpoint) {
                    return Err(AnalyticsError::InvalidProjection(format!(
                        "relation {} needs node type {} which is not projected",
                        relation, endpoint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A deduplicated, index-addressed edge
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedEdge {
    pub source: usize,
    pub target: usize,
    pub relation: RelationType,
    pub weight: f64,
}

/// Immutable in-memory snapshot of the graph for one run
#[derive(Debug)]
pub struct Projection {
    /// Node arena; the position in the map is the dense index
    nodes: IndexMap<NodeKey, Node>,
    edges: Vec<ProjectedEdge>,
    /// Edge positions per head node
    incoming: Vec<Vec<usize>>,
    spec: ProjectionSpec,
}

impl Projection {
    /// Build a projection from a source.
    ///
    /// Node indices follow the order of `spec.node_types`, then source order.
    /// Parallel edges with the same `(source, target, relation)` are merged
    /// by summing their weights.
    pub fn build<S>(source: &S, spec: &ProjectionSpec, retry: &RetryPolicy) -> AnalyticsResult<Self>
    where
        S: GraphSource + ?Sized,
    {
        spec.validate()?;

        let mut node_types: Vec<NodeType> = Vec::with_capacity(spec.node_types.len());
        for t in &spec.node_types {
            if !node_types.contains(t) {
                node_types.push(*t);
            }
        }

        let mut nodes: IndexMap<NodeKey, Node> = IndexMap::new();
        for &node_type in &node_types {
            let batch = retry.run(&format!("list_nodes({})", node_type), || {
                source.list_nodes(node_type)
            })?;
            debug!("Fetched {} {} nodes", batch.len(), node_type);

            for node in batch {
                if node.node_type != node_type {
                    return Err(SourceError::Malformed(format!(
                        "list_nodes({}) returned node {}",
                        node_type,
                        node.key()
                    ))
                    .into());
                }
                let key = node.key();
                if nodes.contains_key(&key) {
                    warn!("Duplicate node {} in source; keeping the first copy", key);
                    continue;
                }
                nodes.insert(key, node);
            }
        }

        if nodes.is_empty() {
            return Err(AnalyticsError::EmptyProjection { node_types });
        }

        let raw_edges = retry.run("list_edges", || source.list_edges(&spec.relation_types))?;

        let mut merged: IndexMap<(usize, usize, RelationType), f64> = IndexMap::new();
        for edge in raw_edges {
            if !spec.relation_types.contains(&edge.relation) {
                continue;
            }
            if !(edge.weight.is_finite() && edge.weight >= 0.0) {
                return Err(AnalyticsError::InvalidProjection(format!(
                    "edge {} {} -> {} has invalid weight {}",
                    edge.relation, edge.source, edge.target, edge.weight
                )));
            }

            let missing = |key: NodeKey| AnalyticsError::MissingEndpoint {
                relation: edge.relation,
                from: edge.source.clone(),
                to: edge.target.clone(),
                missing: key,
            };
            let source_key = edge.source_key();
            let s = nodes.get_index_of(&source_key).ok_or_else(|| missing(source_key.clone()))?;
            let target_key = edge.target_key();
            let t = nodes.get_index_of(&target_key).ok_or_else(|| missing(target_key.clone()))?;

            let mut weight = edge.weight;
            if spec.weight_policy == WeightPolicy::SeverityWeighted && edge.relation == RelationType::Affects {
                if let Some(severity) = nodes[s].severity() {
                    weight *= severity.clamp(0.0, 10.0) / 10.0;
                }
            }

            *merged.entry((s, t, edge.relation)).or_insert(0.0) += weight;
        }

        let edges: Vec<ProjectedEdge> = merged
            .into_iter()
            .map(|((source, target, relation), weight)| ProjectedEdge {
                source,
                target,
                relation,
                weight,
            })
            .collect();

        let mut incoming = vec![Vec::new(); nodes.len()];
        for (pos, edge) in edges.iter().enumerate() {
            incoming[edge.target].push(pos);
        }

        info!("Projection built: {} nodes, {} edges", nodes.len(), edges.len());

        Ok(Self {
            nodes,
            edges,
            incoming,
            spec: spec.clone(),
        })
    }

    pub fn spec(&self) -> &ProjectionSpec {
        &self.spec
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node at a dense index
    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Key at a dense index
    pub fn key(&self, idx: usize) -> NodeKey {
        self.nodes[idx].key()
    }

    pub fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.nodes.get_index_of(key)
    }

    /// `(index, node)` pairs in index order
    pub fn nodes(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.values().enumerate()
    }

    /// Indices of all nodes of one type
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<usize> {
        self.nodes()
            .filter(|(_, node)| node.node_type == node_type)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn edges(&self) -> &[ProjectedEdge] {
        &self.edges
    }

    /// Edges of one relation pointing at `idx`
    pub fn in_edges_of(&self, idx: usize, relation: RelationType) -> impl Iterator<Item = &ProjectedEdge> {
        self.incoming[idx]
            .iter()
            .map(move |&pos| &self.edges[pos])
            .filter(move |edge| edge.relation == relation)
    }

    /// Weighted CSR view for the algorithm crate; NodeId == dense index
    pub fn graph_view(&self) -> GraphView {
        let edges: Vec<(usize, usize, f64)> =
            self.edges.iter().map(|e| (e.source, e.target, e.weight)).collect();
        GraphView::from_edges((0..self.nodes.len() as u64).collect(), &edges, true)
    }

    /// Group id per index (node type), for same-type comparisons
    pub fn node_groups(&self) -> Vec<usize> {
        self.nodes
            .values()
            .map(|node| node.node_type as usize)
            .collect()
    }

    /// Node count per projected type
    pub fn type_counts(&self) -> Vec<(NodeType, usize)> {
        self.spec
            .node_types
            .iter()
            .map(|&t| (t, self.nodes.values().filter(|n| n.node_type == t).count()))
            .collect()
    }

    /// Edge count per projected relation
    pub fn relation_counts(&self) -> Vec<(RelationType, usize)> {
        self.spec
            .relation_types
            .iter()
            .map(|&r| (r, self.edges.iter().filter(|e| e.relation == r).count()))
            .collect()
    }
}
