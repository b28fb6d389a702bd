//! Error and warning taxonomy of an analytics run

use crate::graph::{NodeKey, NodeType, RelationType, SourceError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage, used to say where a run failed or warned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Projection,
    #[serde(rename = "pagerank")]
    PageRank,
    Betweenness,
    Community,
    Similarity,
    Risk,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Projection => "projection",
            Stage::PageRank => "pagerank",
            Stage::Betweenness => "betweenness",
            Stage::Community => "community",
            Stage::Similarity => "similarity",
            Stage::Risk => "risk",
            Stage::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fatal analytics errors
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Empty projection: no nodes of types {node_types:?}")]
    EmptyProjection { node_types: Vec<NodeType> },

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Edge {relation} {from} -> {to} references missing node {missing}")]
    MissingEndpoint {
        relation: RelationType,
        from: String,
        to: String,
        missing: NodeKey,
    },

    #[error("Graph source error: {0}")]
    Source(#[from] SourceError),

    #[error("Run exceeded its time budget of {budget:?} ({elapsed:?} elapsed)")]
    Timeout { elapsed: Duration, budget: Duration },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// A failed run: the error plus the stage it surfaced in
#[derive(Error, Debug)]
#[error("analytics run failed during {stage} stage: {error}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub error: AnalyticsError,
}

impl RunFailure {
    pub fn new(stage: Stage, error: AnalyticsError) -> Self {
        Self { stage, error }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.error, AnalyticsError::Timeout { .. })
    }
}

/// Non-fatal conditions; the run completes and reports them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticsWarning {
    /// The projection has more than one weakly connected component
    DisconnectedGraph { components: usize },
    /// An iteration cap was hit before the tolerance was met; the result is approximate
    ConvergenceNotReached { stage: Stage, iterations: usize },
}

impl fmt::Display for AnalyticsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsWarning::DisconnectedGraph { components } => {
                write!(f, "graph has {} weakly connected components", components)
            }
            AnalyticsWarning::ConvergenceNotReached { stage, iterations } => {
                write!(f, "{} did not converge within {} iterations", stage, iterations)
            }
        }
    }
}
