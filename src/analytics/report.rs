//! Export adapter: the capped, serializable report of a run

use super::error::{AnalyticsResult, AnalyticsWarning, Stage};
use super::projection::Projection;
use super::risk::{ProductRisk, RiskResult};
use crate::graph::{NodeKey, NodeType};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Dense per-node stage outputs, indexed by projection index
#[derive(Debug, Clone, Default)]
pub struct NodeScores {
    pub pagerank: Vec<f64>,
    pub betweenness: Vec<f64>,
    pub community: Vec<usize>,
    /// Members per community label, ascending index order
    pub communities: Vec<Vec<usize>>,
    pub modularity: f64,
    /// Best-first similar nodes per node
    pub similar: Vec<Vec<(usize, f64)>>,
}

/// Section sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub top_k: usize,
    pub representatives_per_community: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_k: 25,
            representatives_per_community: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedNode {
    pub node_type: NodeType,
    pub id: String,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunitySummary {
    pub community_id: usize,
    pub member_count: usize,
    pub product_count: usize,
    /// Highest-PageRank members
    pub representatives: Vec<NodeKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarEntry {
    pub node: NodeKey,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarNodes {
    pub node: NodeKey,
    pub similar: Vec<SimilarEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(stage: Stage, elapsed: Duration) -> Self {
        Self {
            stage,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    /// RFC 3339, UTC
    pub generated_at: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub community_count: usize,
    pub modularity: f64,
    pub stage_timings: Vec<StageTiming>,
}

/// Structured report of one successful run
///
/// Every section is capped at `ReportOptions::top_k`; the full per-node
/// values stay in the run's annotations. Betweenness is unnormalized and
/// grows with graph size, so compare it only within one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub metadata: RunMetadata,
    pub top_nodes_by_pagerank: Vec<RankedNode>,
    pub top_nodes_by_betweenness: Vec<RankedNode>,
    pub communities: Vec<CommunitySummary>,
    pub product_risk_scores: Vec<ProductRisk>,
    pub similar_nodes: Vec<SimilarNodes>,
    pub warnings: Vec<AnalyticsWarning>,
}

/// Descending by score, then ascending by key
fn by_score_then_key<'a>(
    projection: &'a Projection,
    scores: &'a [f64],
) -> impl Fn(&usize, &usize) -> Ordering + 'a {
    move |&a, &b| {
        scores[b]
            .total_cmp(&scores[a])
            .then_with(|| projection.key(a).cmp(&projection.key(b)))
    }
}

fn top_nodes(projection: &Projection, scores: &[f64], top_k: usize) -> Vec<RankedNode> {
    let mut order: Vec<usize> = (0..projection.node_count()).collect();
    order.sort_by(by_score_then_key(projection, scores));
    order
        .into_iter()
        .take(top_k)
        .map(|idx| {
            let node = projection.node(idx);
            RankedNode {
                node_type: node.node_type,
                id: node.id.clone(),
                name: node.name().to_string(),
                score: scores[idx],
            }
        })
        .collect()
}

impl AnalyticsReport {
    pub fn build(
        projection: &Projection,
        scores: &NodeScores,
        risk: &RiskResult,
        warnings: Vec<AnalyticsWarning>,
        stage_timings: Vec<StageTiming>,
        options: &ReportOptions,
    ) -> Self {
        let top_k = options.top_k;

        let mut communities: Vec<CommunitySummary> = scores
            .communities
            .iter()
            .enumerate()
            .map(|(community_id, members)| {
                let mut ranked = members.clone();
                ranked.sort_by(by_score_then_key(projection, &scores.pagerank));
                CommunitySummary {
                    community_id,
                    member_count: members.len(),
                    product_count: members
                        .iter()
                        .filter(|&&m| projection.node(m).node_type == NodeType::Product)
                        .count(),
                    representatives: ranked
                        .into_iter()
                        .take(options.representatives_per_community)
                        .map(|m| projection.key(m))
                        .collect(),
                }
            })
            .collect();
        communities.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then(a.community_id.cmp(&b.community_id))
        });
        communities.truncate(top_k);

        let product_risk_scores: Vec<ProductRisk> =
            risk.ranked().into_iter().take(top_k).cloned().collect();

        let mut with_peers: Vec<usize> = (0..projection.node_count())
            .filter(|&idx| scores.similar.get(idx).is_some_and(|s| !s.is_empty()))
            .collect();
        let best: Vec<f64> = (0..projection.node_count())
            .map(|idx| {
                scores
                    .similar
                    .get(idx)
                    .and_then(|s| s.first())
                    .map_or(0.0, |&(_, score)| score)
            })
            .collect();
        with_peers.sort_by(by_score_then_key(projection, &best));
        let similar_nodes = with_peers
            .into_iter()
            .take(top_k)
            .map(|idx| SimilarNodes {
                node: projection.key(idx),
                similar: scores.similar[idx]
                    .iter()
                    .map(|&(other, score)| SimilarEntry {
                        node: projection.key(other),
                        score,
                    })
                    .collect(),
            })
            .collect();

        AnalyticsReport {
            metadata: RunMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                node_count: projection.node_count(),
                edge_count: projection.edge_count(),
                community_count: scores.communities.len(),
                modularity: scores.modularity,
                stage_timings,
            },
            top_nodes_by_pagerank: top_nodes(projection, &scores.pagerank, top_k),
            top_nodes_by_betweenness: top_nodes(projection, &scores.betweenness, top_k),
            communities,
            product_risk_scores,
            similar_nodes,
            warnings,
        }
    }

    pub fn to_json_pretty(&self) -> AnalyticsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: impl AsRef<Path>) -> AnalyticsResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?)?;
        info!("Report written to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::projection::ProjectionSpec;
    use crate::analytics::risk::{score_products, RiskConfig};
    use crate::graph::{Edge, InMemoryGraph, Node, RetryPolicy};

    fn fixture() -> (Projection, NodeScores) {
        let graph = InMemoryGraph::new()
            .with_node(Node::vulnerability("CVE-1", 9.0).with_property("name", "Heartbleed"))
            .with_node(Node::vulnerability("CVE-2", 5.0))
            .with_node(Node::new(NodeType::Product, "p1"))
            .with_node(Node::new(NodeType::Product, "p2"))
            .with_node(Node::new(NodeType::ThreatReport, "r1"))
            .with_edge(Edge::affects("CVE-1", "p1"))
            .with_edge(Edge::affects("CVE-2", "p1"))
            .with_edge(Edge::affects("CVE-2", "p2"))
            .with_edge(Edge::references("r1", "CVE-1"));
        let projection =
            Projection::build(&graph, &ProjectionSpec::default(), &RetryPolicy::default()).unwrap();

        // CVE-1, CVE-2, p1, p2, r1
        let scores = NodeScores {
            pagerank: vec![0.2, 0.2, 1.5, 0.5, 0.15],
            betweenness: vec![1.0, 0.0, 0.0, 0.0, 0.0],
            community: vec![0, 1, 0, 1, 0],
            communities: vec![vec![0, 2, 4], vec![1, 3]],
            modularity: 0.1,
            similar: vec![vec![(1, 0.5)], vec![(0, 0.5)], vec![(3, 0.5)], vec![(2, 0.5)], vec![]],
        };
        (projection, scores)
    }

    fn report(options: &ReportOptions) -> AnalyticsReport {
        let (projection, scores) = fixture();
        let risk = score_products(&projection, &scores.pagerank, &scores.community, &RiskConfig::default());
        AnalyticsReport::build(
            &projection,
            &scores,
            &risk,
            vec![AnalyticsWarning::DisconnectedGraph { components: 2 }],
            vec![StageTiming::new(Stage::PageRank, Duration::from_millis(3))],
            options,
        )
    }

    #[test]
    fn test_sections_are_ranked() {
        let report = report(&ReportOptions::default());

        assert_eq!(report.top_nodes_by_pagerank[0].id, "p1");
        assert_eq!(report.top_nodes_by_pagerank.len(), 5);
        assert_eq!(report.top_nodes_by_betweenness[0].name, "Heartbleed");

        assert_eq!(report.communities[0].member_count, 3);
        assert_eq!(
            report.communities[0].representatives[0],
            NodeKey::new(NodeType::Product, "p1")
        );
        assert_eq!(report.communities[0].product_count, 1);

        assert_eq!(report.product_risk_scores[0].product_id, "p1");
        assert!(report.product_risk_scores[0].risk_score >= report.product_risk_scores[1].risk_score);

        assert_eq!(report.similar_nodes.len(), 4);
        assert_eq!(report.metadata.node_count, 5);
        assert_eq!(report.metadata.community_count, 2);
    }

    #[test]
    fn test_sections_are_capped() {
        let report = report(&ReportOptions {
            top_k: 1,
            representatives_per_community: 2,
        });
        assert_eq!(report.top_nodes_by_pagerank.len(), 1);
        assert_eq!(report.top_nodes_by_betweenness.len(), 1);
        assert_eq!(report.communities.len(), 1);
        assert_eq!(report.communities[0].representatives.len(), 2);
        assert_eq!(report.product_risk_scores.len(), 1);
        assert_eq!(report.similar_nodes.len(), 1);
    }

    #[test]
    fn test_json_export() {
        let report = report(&ReportOptions::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["top_nodes_by_pagerank"][0]["id"], "p1");
        assert_eq!(json["top_nodes_by_pagerank"][0]["node_type"], "Product");
        assert_eq!(json["warnings"][0]["kind"], "disconnected_graph");
        assert_eq!(json["metadata"]["stage_timings"][0]["stage"], "pagerank");
        assert!(json["product_risk_scores"][0].get("index").is_none());
        assert!(json["metadata"]["generated_at"].is_string());
    }
}
