//! Threatrank
//!
//! Graph analytics for security knowledge graphs: ranks and clusters
//! vulnerabilities, products, threat reports and attack techniques, and
//! computes a composite risk score per product.
//!
//! # Architecture
//!
//! - `graph`: typed node/edge model and the read-only `GraphSource` interface
//! - `analytics`: projection builder, risk scorer, report export and the run pipeline
//! - `threatrank-algorithms` crate: PageRank, betweenness, Louvain, WCC and
//!   Jaccard similarity over a CSR `GraphView`
//!
//! ## Example Usage
//!
//! ```rust
//! use threatrank::analytics::{AnalyticsConfig, AnalyticsEngine};
//! use threatrank::graph::{Edge, InMemoryGraph, Node, NodeType};
//!
//! let graph = InMemoryGraph::new()
//!     .with_node(Node::vulnerability("CVE-2024-0001", 9.8))
//!     .with_node(Node::new(NodeType::Product, "openssl"))
//!     .with_edge(Edge::affects("CVE-2024-0001", "openssl"));
//!
//! let engine = AnalyticsEngine::new(AnalyticsConfig::default()).unwrap();
//! let run = engine.run(&graph).unwrap();
//! assert!(run.annotations.risk["openssl"] > 0.0);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod analytics;
pub mod graph;

// Re-export main types for convenience
pub use graph::{
    Edge, GraphDocument, GraphSource, InMemoryGraph, Node, NodeKey, NodeType, PropertyMap,
    PropertyValue, RelationType, RetryPolicy, SourceError, SourceResult,
};

pub use analytics::{
    AnalyticsConfig, AnalyticsEngine, AnalyticsError, AnalyticsReport, AnalyticsResult,
    AnalyticsRun, AnalyticsWarning, Annotations, Projection, ProjectionSpec, RunFailure, Stage,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
