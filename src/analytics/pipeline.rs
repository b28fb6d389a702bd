//! Analytics run orchestration
//!
//! projection -> pagerank -> betweenness -> community -> similarity -> risk -> report
//!
//! The deadline and the cancellation flag are checked before and after every
//! stage and polled inside the algorithms (per iteration, pass, or source
//! node). A run either returns every annotation or a `RunFailure` naming the
//! stage that was running when the budget ran out; partial results are
//! dropped.

use super::config::AnalyticsConfig;
use super::error::{AnalyticsError, AnalyticsResult, AnalyticsWarning, RunFailure, Stage};
use super::projection::Projection;
use super::report::{AnalyticsReport, NodeScores, ReportOptions, StageTiming};
use super::risk::{score_products, RiskResult};
use crate::graph::{GraphSource, NodeKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use threatrank_algorithms::{
    betweenness_centrality_with_interrupt, louvain_with_interrupt, node_similarity,
    node_similarity_with_interrupt, page_rank_with_interrupt, weakly_connected_components, NodeId,
    SimilarityResult,
};
use tracing::{info, warn};

/// Wall-clock budget and cancellation flag of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    started: Instant,
    budget: Duration,
    cancel: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(budget: Duration, cancel: Arc<AtomicBool>) -> Self {
        Self {
            started: Instant::now(),
            budget,
            cancel,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn should_stop(&self) -> bool {
        self.cancel.load(Ordering::Relaxed) || self.elapsed() >= self.budget
    }

    /// Fail if the run was cancelled or is out of time
    pub fn check(&self) -> AnalyticsResult<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(AnalyticsError::Cancelled);
        }
        let elapsed = self.elapsed();
        if elapsed >= self.budget {
            return Err(AnalyticsError::Timeout {
                elapsed,
                budget: self.budget,
            });
        }
        Ok(())
    }
}

/// Full per-node results of a run
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    pub pagerank: HashMap<NodeKey, f64>,
    pub betweenness: HashMap<NodeKey, f64>,
    pub community: HashMap<NodeKey, usize>,
    pub similar: HashMap<NodeKey, Vec<(NodeKey, f64)>>,
    /// product id -> risk score
    pub risk: HashMap<String, f64>,
}

/// Output of a successful run
#[derive(Debug, Clone)]
pub struct AnalyticsRun {
    pub annotations: Annotations,
    pub report: AnalyticsReport,
    /// Per-product risk breakdown, uncapped
    pub risk: RiskResult,
}

/// Runs the analytics pipeline against a graph source
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
}

/// Collect a `NodeId`-keyed map into a dense vector
fn dense<T: Copy>(n: usize, map: &HashMap<NodeId, T>, missing: T) -> Vec<T> {
    (0..n)
        .map(|idx| map.get(&(idx as NodeId)).copied().unwrap_or(missing))
        .collect()
}

struct StageClock<'a> {
    ctx: &'a RunContext,
    timings: Vec<StageTiming>,
}

impl StageClock<'_> {
    /// Run and time one stage, checking the budget on both sides.
    ///
    /// An overrun found after the body is charged to this stage.
    fn run<T>(&mut self, stage: Stage, f: impl FnOnce() -> AnalyticsResult<T>) -> Result<T, RunFailure> {
        self.ctx.check().map_err(|e| RunFailure::new(stage, e))?;
        let start = Instant::now();
        let value = f().map_err(|e| RunFailure::new(stage, e))?;
        self.ctx.check().map_err(|e| RunFailure::new(stage, e))?;
        let elapsed = start.elapsed();
        info!("Stage {} finished in {:?}", stage, elapsed);
        self.timings.push(StageTiming::new(stage, elapsed));
        Ok(value)
    }
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Build the configured projection without running any algorithm
    pub fn project<S>(&self, source: &S) -> AnalyticsResult<Projection>
    where
        S: GraphSource + ?Sized,
    {
        Projection::build(source, &self.config.projection, &self.config.source_retry)
    }

    /// Same-type Jaccard neighbors over a projection
    pub fn similar_nodes(&self, projection: &Projection) -> SimilarityResult {
        let groups = projection.node_groups();
        node_similarity(&projection.graph_view(), Some(&groups), &self.config.similarity())
    }

    pub fn run<S>(&self, source: &S) -> Result<AnalyticsRun, RunFailure>
    where
        S: GraphSource + ?Sized,
    {
        self.run_with_cancel(source, Arc::new(AtomicBool::new(false)))
    }

    /// Run the pipeline; setting `cancel` aborts it at the next check
    pub fn run_with_cancel<S>(&self, source: &S, cancel: Arc<AtomicBool>) -> Result<AnalyticsRun, RunFailure>
    where
        S: GraphSource + ?Sized,
    {
        let config = &self.config;
        let ctx = RunContext::new(config.run_timeout(), cancel);
        let mut clock = StageClock {
            ctx: &ctx,
            timings: Vec::new(),
        };
        let mut warnings: Vec<AnalyticsWarning> = Vec::new();

        info!("Starting analytics run (budget {:?})", config.run_timeout());

        let (projection, view) = clock.run(Stage::Projection, || {
            let projection = self.project(source)?;
            let view = projection.graph_view();
            Ok((projection, view))
        })?;
        let n = projection.node_count();

        let components = weakly_connected_components(&view).component_count();
        if components > 1 {
            warnings.push(AnalyticsWarning::DisconnectedGraph { components });
        }

        let pagerank = clock.run(Stage::PageRank, || {
            let result = page_rank_with_interrupt(&view, &config.pagerank(), || ctx.should_stop())
                .ok_or_else(|| interruption(&ctx))?;
            if !result.converged {
                warnings.push(AnalyticsWarning::ConvergenceNotReached {
                    stage: Stage::PageRank,
                    iterations: result.iterations,
                });
            }
            Ok(dense(n, &result.scores, 0.0))
        })?;

        let betweenness = clock.run(Stage::Betweenness, || {
            let result = betweenness_centrality_with_interrupt(&view, &config.betweenness(), || {
                ctx.should_stop()
            });
            match result {
                Some(result) => Ok(dense(n, &result.scores, 0.0)),
                None => Err(interruption(&ctx)),
            }
        })?;

        let (community, communities, modularity) = clock.run(Stage::Community, || {
            let result = louvain_with_interrupt(&view, &config.louvain(), || ctx.should_stop())
                .ok_or_else(|| interruption(&ctx))?;
            if !result.converged {
                warnings.push(AnalyticsWarning::ConvergenceNotReached {
                    stage: Stage::Community,
                    iterations: result.levels,
                });
            }
            let community = dense(n, &result.node_community, 0);
            let mut communities = vec![Vec::new(); result.communities.len()];
            for (idx, &label) in community.iter().enumerate() {
                communities[label].push(idx);
            }
            Ok((community, communities, result.modularity))
        })?;

        let similar = clock.run(Stage::Similarity, || {
            let groups = projection.node_groups();
            let result = node_similarity_with_interrupt(&view, Some(&groups), &config.similarity(), || {
                ctx.should_stop()
            })
            .ok_or_else(|| interruption(&ctx))?;
            Ok((0..n)
                .map(|idx| {
                    result
                        .neighbors
                        .get(&(idx as NodeId))
                        .map(|peers| peers.iter().map(|&(id, score)| (id as usize, score)).collect())
                        .unwrap_or_default()
                })
                .collect::<Vec<Vec<(usize, f64)>>>())
        })?;

        let risk = clock.run(Stage::Risk, || {
            let result = score_products(&projection, &pagerank, &community, &config.risk());
            if !result.converged {
                warnings.push(AnalyticsWarning::ConvergenceNotReached {
                    stage: Stage::Risk,
                    iterations: result.iterations,
                });
            }
            Ok(result)
        })?;

        for warning in &warnings {
            warn!("{}", warning);
        }

        let scores = NodeScores {
            pagerank,
            betweenness,
            community,
            communities,
            modularity,
            similar,
        };
        let options = ReportOptions {
            top_k: config.report_top_k,
            representatives_per_community: config.representatives_per_community,
        };
        let timings = clock.timings.clone();
        let report = clock.run(Stage::Report, || {
            Ok(AnalyticsReport::build(&projection, &scores, &risk, warnings, timings, &options))
        })?;

        let annotations = annotate(&projection, &scores, &risk);
        info!(
            "Analytics run finished in {:?}: {} nodes, {} edges, {} communities, {} products scored",
            ctx.elapsed(),
            n,
            projection.edge_count(),
            scores.communities.len(),
            risk.products.len()
        );

        Ok(AnalyticsRun {
            annotations,
            report,
            risk,
        })
    }
}

/// The error for an interrupted stage
fn interruption(ctx: &RunContext) -> AnalyticsError {
    ctx.check().err().unwrap_or(AnalyticsError::Cancelled)
}

fn annotate(projection: &Projection, scores: &NodeScores, risk: &RiskResult) -> Annotations {
    let keys: Vec<NodeKey> = (0..projection.node_count()).map(|idx| projection.key(idx)).collect();
    let zip = |values: &[f64]| -> HashMap<NodeKey, f64> {
        keys.iter().cloned().zip(values.iter().copied()).collect()
    };

    Annotations {
        pagerank: zip(&scores.pagerank),
        betweenness: zip(&scores.betweenness),
        community: keys.iter().cloned().zip(scores.community.iter().copied()).collect(),
        similar: scores
            .similar
            .iter()
            .enumerate()
            .filter(|(_, peers)| !peers.is_empty())
            .map(|(idx, peers)| {
                let peers = peers.iter().map(|&(other, s)| (keys[other].clone(), s)).collect();
                (keys[idx].clone(), peers)
            })
            .collect(),
        risk: risk
            .products
            .iter()
            .map(|p| (p.product_id.clone(), p.risk_score))
            .collect(),
    }
}
