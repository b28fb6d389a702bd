//! Analytics run configuration
//!
//! Every option has a default; a YAML file only needs the keys it overrides.

use super::error::{AnalyticsError, AnalyticsResult};
use super::projection::ProjectionSpec;
use super::risk::RiskConfig;
use crate::graph::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use threatrank_algorithms::{BetweennessConfig, LouvainConfig, PageRankConfig, SimilarityConfig};
use tracing::info;

/// Configuration of one analytics run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// PageRank damping factor
    pub damping_factor: f64,
    /// L1 tolerance on the PageRank delta
    pub pagerank_tolerance: f64,
    pub pagerank_max_iterations: usize,

    /// Minimum modularity gain per Louvain level
    pub louvain_tolerance: f64,
    pub louvain_max_passes: usize,
    pub louvain_max_levels: usize,

    /// Jaccard neighbors kept per node
    pub similarity_top_k: usize,

    /// Weight of the community term in product risk
    pub community_risk_weight: f64,
    pub risk_tolerance: f64,
    pub risk_max_iterations: usize,

    /// Wall-clock budget for the whole run (0 = already expired)
    pub run_timeout_seconds: u64,

    /// Entries per report section
    pub report_top_k: usize,
    /// Members listed per community in the report
    pub representatives_per_community: usize,

    /// Treat edge weights as path lengths in betweenness
    pub betweenness_weighted: bool,
    pub betweenness_parallel: bool,

    pub projection: ProjectionSpec,
    pub source_retry: RetryPolicy,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            pagerank_tolerance: 1e-6,
            pagerank_max_iterations: 20,
            louvain_tolerance: 1e-4,
            louvain_max_passes: 10,
            louvain_max_levels: 10,
            similarity_top_k: 10,
            community_risk_weight: 0.1,
            risk_tolerance: 1e-3,
            risk_max_iterations: 5,
            run_timeout_seconds: 300,
            report_top_k: 25,
            representatives_per_community: 3,
            betweenness_weighted: false,
            betweenness_parallel: true,
            projection: ProjectionSpec::default(),
            source_retry: RetryPolicy::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> AnalyticsResult<Self> {
        let config: AnalyticsConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        info!("Loading analytics configuration from {:?}", path);
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Check value ranges
    pub fn validate(&self) -> AnalyticsResult<()> {
        let fail = |msg: String| Err(AnalyticsError::Config(msg));

        if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
            return fail(format!("damping_factor must be in (0, 1), got {}", self.damping_factor));
        }
        if !(self.pagerank_tolerance > 0.0) {
            return fail(format!("pagerank_tolerance must be > 0, got {}", self.pagerank_tolerance));
        }
        if self.pagerank_max_iterations == 0 {
            return fail("pagerank_max_iterations must be at least 1".to_string());
        }
        if !(self.louvain_tolerance >= 0.0) {
            return fail(format!("louvain_tolerance must be >= 0, got {}", self.louvain_tolerance));
        }
        if self.louvain_max_passes == 0 || self.louvain_max_levels == 0 {
            return fail("louvain_max_passes and louvain_max_levels must be at least 1".to_string());
        }
        if self.similarity_top_k == 0 {
            return fail("similarity_top_k must be at least 1".to_string());
        }
        if !(self.community_risk_weight >= 0.0 && self.community_risk_weight < 1.0) {
            return fail(format!(
                "community_risk_weight must be in [0, 1), got {}",
                self.community_risk_weight
            ));
        }
        if !(self.risk_tolerance > 0.0) {
            return fail(format!("risk_tolerance must be > 0, got {}", self.risk_tolerance));
        }
        if self.risk_max_iterations == 0 {
            return fail("risk_max_iterations must be at least 1".to_string());
        }
        if self.report_top_k == 0 || self.representatives_per_community == 0 {
            return fail("report_top_k and representatives_per_community must be at least 1".to_string());
        }
        if self.source_retry.max_attempts == 0 {
            return fail("source_retry.max_attempts must be at least 1".to_string());
        }
        self.projection.validate()
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }

    pub fn pagerank(&self) -> PageRankConfig {
        PageRankConfig {
            damping_factor: self.damping_factor,
            iterations: self.pagerank_max_iterations,
            tolerance: self.pagerank_tolerance,
        }
    }

    pub fn betweenness(&self) -> BetweennessConfig {
        BetweennessConfig {
            weighted: self.betweenness_weighted,
            parallel: self.betweenness_parallel,
            ..Default::default()
        }
    }

    pub fn louvain(&self) -> LouvainConfig {
        LouvainConfig {
            tolerance: self.louvain_tolerance,
            max_passes: self.louvain_max_passes,
            max_levels: self.louvain_max_levels,
        }
    }

    pub fn similarity(&self) -> SimilarityConfig {
        SimilarityConfig {
            top_k: self.similarity_top_k,
        }
    }

    pub fn risk(&self) -> RiskConfig {
        RiskConfig {
            community_weight: self.community_risk_weight,
            tolerance: self.risk_tolerance,
            max_iterations: self.risk_max_iterations,
        }
    }
}
