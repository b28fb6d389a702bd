//! Directed relations between knowledge-graph nodes

use super::types::{NodeKey, RelationType};
use serde::{Deserialize, Serialize};

fn default_weight() -> f64 {
    1.0
}

/// A directed edge `(source_id, target_id, relation, weight)`
///
/// Endpoint types are implied by the relation, so only ids are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Id of the tail node (type = `relation.source_type()`)
    pub source: String,

    /// Id of the head node (type = `relation.target_type()`)
    pub target: String,

    /// Type of relationship
    pub relation: RelationType,

    /// Edge weight, 1.0 unless stated otherwise
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Edge {
    /// Create an edge with the default weight
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: RelationType) -> Self {
        Edge {
            source: source.into(),
            target: target.into(),
            relation,
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn affects(vulnerability: impl Into<String>, product: impl Into<String>) -> Self {
        Edge::new(vulnerability, product, RelationType::Affects)
    }

    pub fn references(report: impl Into<String>, vulnerability: impl Into<String>) -> Self {
        Edge::new(report, vulnerability, RelationType::References)
    }

    pub fn uses(report: impl Into<String>, technique: impl Into<String>) -> Self {
        Edge::new(report, technique, RelationType::Uses)
    }

    pub fn source_key(&self) -> NodeKey {
        NodeKey::new(self.relation.source_type(), self.source.clone())
    }

    pub fn target_key(&self) -> NodeKey {
        NodeKey::new(self.relation.target_type(), self.target.clone())
    }
}
