//! Core type definitions for the security knowledge graph

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity stored in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum NodeType {
    Vulnerability,
    Product,
    ThreatReport,
    Technique,
}

impl NodeType {
    /// Every node type, in projection order
    pub const ALL: [NodeType; 4] = [
        NodeType::Vulnerability,
        NodeType::Product,
        NodeType::ThreatReport,
        NodeType::Technique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Vulnerability => "Vulnerability",
            NodeType::Product => "Product",
            NodeType::ThreatReport => "ThreatReport",
            NodeType::Technique => "Technique",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown node type '{}'", s))
    }
}

/// Directed relationship type. The relation fixes both endpoint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Vulnerability -> Product
    Affects,
    /// ThreatReport -> Vulnerability
    References,
    /// ThreatReport -> Technique
    Uses,
}

impl RelationType {
    pub const ALL: [RelationType; 3] = [
        RelationType::Affects,
        RelationType::References,
        RelationType::Uses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Affects => "AFFECTS",
            RelationType::References => "REFERENCES",
            RelationType::Uses => "USES",
        }
    }

    /// Node type at the tail of the edge
    pub fn source_type(&self) -> NodeType {
        match self {
            RelationType::Affects => NodeType::Vulnerability,
            RelationType::References | RelationType::Uses => NodeType::ThreatReport,
        }
    }

    /// Node type at the head of the edge
    pub fn target_type(&self) -> NodeType {
        match self {
            RelationType::Affects => NodeType::Product,
            RelationType::References => NodeType::Vulnerability,
            RelationType::Uses => NodeType::Technique,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown relation type '{}'", s))
    }
}

/// Identity of a node: ids are only unique within a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeKey {
    pub node_type: NodeType,
    pub id: String,
}

impl NodeKey {
    pub fn new(node_type: NodeType, id: impl Into<String>) -> Self {
        NodeKey {
            node_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_type, self.id)
    }
}
