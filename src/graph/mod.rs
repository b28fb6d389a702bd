//! Security knowledge graph data model
//!
//! - Typed nodes (vulnerabilities, products, threat reports, techniques) with attribute bags
//! - Directed relations whose type fixes the endpoint node types
//! - The read-only `GraphSource` interface and an in-memory implementation

pub mod edge;
pub mod node;
pub mod property;
pub mod source;
pub mod types;

// Re-export main types
pub use edge::Edge;
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use source::{GraphDocument, GraphSource, InMemoryGraph, RetryPolicy, SourceError, SourceResult};
pub use types::{NodeKey, NodeType, RelationType};
