//! Knowledge-graph nodes

use super::property::{PropertyMap, PropertyValue};
use super::types::{NodeKey, NodeType};
use serde::{Deserialize, Serialize};

/// Attribute holding a vulnerability's severity (CVSS-like, 0..=10)
pub const SEVERITY: &str = "severity";
/// Human readable label
pub const NAME: &str = "name";

/// A typed vertex of the security knowledge graph
///
/// The `(node_type, id)` pair identifies a node; the attribute bag is
/// type-specific and never modified by analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within `node_type`
    pub id: String,

    /// Entity kind
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Type-specific attributes
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Node {
    /// Create a node without attributes
    pub fn new(node_type: NodeType, id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            node_type,
            properties: PropertyMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Shorthand for a vulnerability with a severity score
    pub fn vulnerability(id: impl Into<String>, severity: f64) -> Self {
        Node::new(NodeType::Vulnerability, id).with_property(SEVERITY, severity)
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.node_type, self.id.clone())
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Severity attribute, if present and numeric
    pub fn severity(&self) -> Option<f64> {
        self.get_property(SEVERITY).and_then(PropertyValue::as_f64)
    }

    /// Display name, falling back to the id
    pub fn name(&self) -> &str {
        self.get_property(NAME)
            .and_then(PropertyValue::as_string)
            .unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vulnerability_severity() {
        let v = Node::vulnerability("CVE-2021-44228", 10.0);
        assert_eq!(v.severity(), Some(10.0));
        assert_eq!(v.key(), NodeKey::new(NodeType::Vulnerability, "CVE-2021-44228"));
    }

    #[test]
    fn test_integer_severity_is_widened() {
        let v = Node::new(NodeType::Vulnerability, "CVE-1").with_property(SEVERITY, 7i64);
        assert_eq!(v.severity(), Some(7.0));
    }

    #[test]
    fn test_name_falls_back_to_id() {
        let p = Node::new(NodeType::Product, "p1");
        assert_eq!(p.name(), "p1");
        let named = p.with_property(NAME, "OpenSSL");
        assert_eq!(named.name(), "OpenSSL");
    }

    #[test]
    fn test_json_shape() {
        let node: Node = serde_json::from_str(
            r#"{"id": "CVE-1", "type": "Vulnerability", "properties": {"severity": 4}}"#,
        )
        .unwrap();
        assert_eq!(node.node_type, NodeType::Vulnerability);
        assert_eq!(node.severity(), Some(4.0));

        let bare: Node = serde_json::from_str(r#"{"id": "T1059", "type": "Technique"}"#).unwrap();
        assert!(bare.properties.is_empty());
    }
}
