//! Read-only access to the persistent knowledge graph
//!
//! The engine never writes to a source. `InMemoryGraph` is the bundled
//! implementation used by embedders, the CLI (via JSON documents) and tests.

use super::edge::Edge;
use super::node::Node;
use super::types::{NodeKey, NodeType, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by a graph source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Temporary failure; the call may succeed if repeated
    #[error("Transient source error: {0}")]
    Transient(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed graph data: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Query interface of the persistent graph store
pub trait GraphSource {
    /// All nodes of one type
    fn list_nodes(&self, node_type: NodeType) -> SourceResult<Vec<Node>>;

    /// All edges whose relation is in `relation_types`
    fn list_edges(&self, relation_types: &[RelationType]) -> SourceResult<Vec<Edge>>;
}

/// Bounded exponential backoff for transient source errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op`, retrying transient failures until attempts run out
    pub fn run<T, F>(&self, what: &str, mut op: F) -> SourceResult<T>
    where
        F: FnMut() -> SourceResult<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what, attempt, max_attempts, e, delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Serialized form of a knowledge graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// In-memory knowledge graph
///
/// - nodes: insertion-ordered arena
/// - type_index: NodeType -> node positions
/// - relation_index: RelationType -> edge positions
///
/// Endpoints are not checked on insert; dangling edges surface when a
/// projection is built.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    type_index: HashMap<NodeType, Vec<usize>>,
    relation_index: HashMap<RelationType, Vec<usize>>,
    key_index: HashMap<NodeKey, usize>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node
    pub fn add_node(&mut self, node: Node) -> NodeKey {
        let key = node.key();
        if let Some(&pos) = self.key_index.get(&key) {
            self.nodes[pos] = node;
        } else {
            let pos = self.nodes.len();
            self.type_index.entry(node.node_type).or_default().push(pos);
            self.key_index.insert(key.clone(), pos);
            self.nodes.push(node);
        }
        key
    }

    pub fn add_edge(&mut self, edge: Edge) {
        let pos = self.edges.len();
        self.relation_index.entry(edge.relation).or_default().push(pos);
        self.edges.push(edge);
    }

    /// Chainable variant of `add_node`
    pub fn with_node(mut self, node: Node) -> Self {
        self.add_node(node);
        self
    }

    /// Chainable variant of `add_edge`
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.add_edge(edge);
        self
    }

    pub fn get_node(&self, key: &NodeKey) -> Option<&Node> {
        self.key_index.get(key).map(|&pos| &self.nodes[pos])
    }

    pub fn get_node_mut(&mut self, key: &NodeKey) -> Option<&mut Node> {
        let pos = *self.key_index.get(key)?;
        self.nodes.get_mut(pos)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn from_document(document: GraphDocument) -> Self {
        let mut graph = Self::new();
        for node in document.nodes {
            graph.add_node(node);
        }
        for edge in document.edges {
            graph.add_edge(edge);
        }
        graph
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn from_json_str(json: &str) -> SourceResult<Self> {
        let document: GraphDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document))
    }

    /// Load a graph document from disk
    pub fn from_json_file(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        info!("Loading graph document from {:?}", path);
        let raw = std::fs::read_to_string(path)?;
        let graph = Self::from_json_str(&raw)?;
        debug!("Loaded {} nodes and {} edges", graph.node_count(), graph.edge_count());
        Ok(graph)
    }
}

impl GraphSource for InMemoryGraph {
    fn list_nodes(&self, node_type: NodeType) -> SourceResult<Vec<Node>> {
        Ok(self
            .type_index
            .get(&node_type)
            .map(|positions| positions.iter().map(|&p| self.nodes[p].clone()).collect())
            .unwrap_or_default())
    }

    fn list_edges(&self, relation_types: &[RelationType]) -> SourceResult<Vec<Edge>> {
        let mut positions: Vec<usize> = relation_types
            .iter()
            .filter_map(|r| self.relation_index.get(r))
            .flatten()
            .copied()
            .collect();
        // Insertion order, whatever order the relations were requested in
        positions.sort_unstable();
        positions.dedup();
        Ok(positions.into_iter().map(|p| self.edges[p].clone()).collect())
    }
}
