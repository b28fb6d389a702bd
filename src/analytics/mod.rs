//! Security graph analytics
//!
//! Builds a projection from a `GraphSource`, runs the centrality, community
//! and similarity algorithms over it, scores products and assembles the
//! report. See `pipeline` for the stage order.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod projection;
pub mod report;
pub mod risk;

pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, AnalyticsResult, AnalyticsWarning, RunFailure, Stage};
pub use pipeline::{AnalyticsEngine, AnalyticsRun, Annotations, RunContext};
pub use projection::{ProjectedEdge, Projection, ProjectionSpec, WeightPolicy};
pub use report::{
    AnalyticsReport, CommunitySummary, NodeScores, RankedNode, ReportOptions, RunMetadata,
    SimilarEntry, SimilarNodes, StageTiming,
};
pub use risk::{score_products, ProductRisk, RiskConfig, RiskResult, MAX_RISK};
