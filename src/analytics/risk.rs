//! Composite product risk scoring
//!
//! ```text
//! base      = Σ severity(affecting vulnerabilities) × pagerank(p) / max product pagerank
//! amplifier = 1 + ln(1 + distinct threat reports referencing those vulnerabilities)
//! community = community_weight × mean risk of the other products in p's community
//! risk      = clamp(base × amplifier + community, 0, 10)
//! ```
//!
//! The community term makes scores depend on each other. It is resolved by
//! fixed-point iteration starting from `clamp(base × amplifier, 0, 10)`.
//! The update is monotone and, with `community_weight < 1`, a contraction
//! with constant `community_weight`, so the error shrinks geometrically. The
//! result after `max_iterations` is an approximation of the exact solution.

use super::projection::Projection;
use crate::graph::{NodeType, RelationType};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

pub const MAX_RISK: f64 = 10.0;

/// Risk scorer parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub community_weight: f64,
    /// Stop when no score moves by this much
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            community_weight: 0.1,
            tolerance: 1e-3,
            max_iterations: 5,
        }
    }
}

/// Score of one product with the terms it was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRisk {
    /// Dense projection index
    #[serde(skip)]
    pub index: usize,
    pub product_id: String,
    pub vulnerability_count: usize,
    pub severity_sum: f64,
    pub threat_report_count: usize,
    pub normalized_pagerank: f64,
    pub base_risk: f64,
    pub threat_amplifier: f64,
    pub community_risk: f64,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RiskResult {
    /// One entry per product, in projection order
    pub products: Vec<ProductRisk>,
    pub iterations: usize,
    pub converged: bool,
}

impl RiskResult {
    /// product id -> score
    pub fn scores(&self) -> FxHashMap<String, f64> {
        self.products
            .iter()
            .map(|p| (p.product_id.clone(), p.risk_score))
            .collect()
    }

    /// Products sorted by score descending, then id ascending
    pub fn ranked(&self) -> Vec<&ProductRisk> {
        let mut ranked: Vec<&ProductRisk> = self.products.iter().collect();
        ranked.sort_by(|a, b| {
            b.risk_score
                .total_cmp(&a.risk_score)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        ranked
    }
}

/// Score every product of the projection.
///
/// `pagerank` and `community` are indexed by projection index.
pub fn score_products(
    projection: &Projection,
    pagerank: &[f64],
    community: &[usize],
    config: &RiskConfig,
) -> RiskResult {
    let products = projection.nodes_of_type(NodeType::Product);
    if products.is_empty() {
        return RiskResult {
            products: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let max_pagerank = products
        .iter()
        .map(|&p| pagerank[p])
        .fold(0.0_f64, f64::max);

    let mut risks: Vec<ProductRisk> = Vec::with_capacity(products.len());
    for &p in &products {
        let mut vulnerability_count = 0;
        let mut severity_sum = 0.0;
        let mut reports: FxHashSet<usize> = FxHashSet::default();

        for edge in projection.in_edges_of(p, RelationType::Affects) {
            let vulnerability = projection.node(edge.source);
            vulnerability_count += 1;
            severity_sum += vulnerability
                .severity()
                .map(|s| s.clamp(0.0, MAX_RISK))
                .unwrap_or(0.0);
            reports.extend(
                projection
                    .in_edges_of(edge.source, RelationType::References)
                    .map(|r| r.source),
            );
        }

        let normalized_pagerank = if max_pagerank > 0.0 {
            pagerank[p] / max_pagerank
        } else {
            0.0
        };
        let base_risk = severity_sum * normalized_pagerank;
        let threat_amplifier = 1.0 + (reports.len() as f64).ln_1p();

        risks.push(ProductRisk {
            index: p,
            product_id: projection.node(p).id.clone(),
            vulnerability_count,
            severity_sum,
            threat_report_count: reports.len(),
            normalized_pagerank,
            base_risk,
            threat_amplifier,
            community_risk: 0.0,
            risk_score: 0.0,
        });
    }

    // Products with no affecting vulnerability stay at 0 but still count as
    // community members.
    let seeds: Vec<Option<f64>> = risks
        .iter()
        .map(|r| (r.vulnerability_count > 0).then(|| r.base_risk * r.threat_amplifier))
        .collect();

    let mut members: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for (pos, r) in risks.iter().enumerate() {
        members.entry(community[r.index]).or_default().push(pos);
    }
    let peers: Vec<&[usize]> = risks
        .iter()
        .map(|r| members[&community[r.index]].as_slice())
        .collect();

    let mut scores: Vec<f64> = seeds
        .iter()
        .map(|s| s.map_or(0.0, |v| v.clamp(0.0, MAX_RISK)))
        .collect();
    let mut community_terms = vec![0.0; risks.len()];

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;

        let mut next = vec![0.0; scores.len()];
        for (pos, seed) in seeds.iter().enumerate() {
            let Some(seed) = seed else { continue };
            let group = peers[pos];
            let term = if group.len() > 1 {
                let others: f64 = group.iter().filter(|&&q| q != pos).map(|&q| scores[q]).sum();
                config.community_weight * others / (group.len() - 1) as f64
            } else {
                0.0
            };
            community_terms[pos] = term;
            next[pos] = (seed + term).clamp(0.0, MAX_RISK);
        }

        let delta = next
            .iter()
            .zip(&scores)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        scores = next;

        debug!("Risk iteration {}: max delta {:.6}", iterations, delta);
        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    for ((risk, score), term) in risks.iter_mut().zip(scores).zip(community_terms) {
        risk.risk_score = score;
        risk.community_risk = term;
    }

    RiskResult {
        products: risks,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, InMemoryGraph, Node, RetryPolicy};
    use crate::analytics::projection::ProjectionSpec;

    fn project(graph: &InMemoryGraph) -> Projection {
        Projection::build(graph, &ProjectionSpec::default(), &RetryPolicy::default()).unwrap()
    }

    fn score(graph: &InMemoryGraph, config: &RiskConfig) -> RiskResult {
        let projection = project(graph);
        let n = projection.node_count();
        score_products(&projection, &vec![1.0; n], &vec![0; n], config)
    }

    fn risk_of<'a>(result: &'a RiskResult, id: &str) -> &'a ProductRisk {
        result.products.iter().find(|p| p.product_id == id).unwrap()
    }

    #[test]
    fn test_product_without_vulnerabilities_scores_zero() {
        let graph = InMemoryGraph::new()
            .with_node(Node::vulnerability("CVE-1", 9.0))
            .with_node(Node::new(NodeType::Product, "p1"))
            .with_node(Node::new(NodeType::Product, "p2"))
            .with_edge(Edge::affects("CVE-1", "p1"));

        let result = score(&graph, &RiskConfig::default());
        assert_eq!(risk_of(&result, "p2").risk_score, 0.0);
        assert_eq!(risk_of(&result, "p2").community_risk, 0.0);
        assert!(risk_of(&result, "p1").risk_score > 0.0);
    }

    #[test]
    fn test_score_terms() {
        let graph = InMemoryGraph::new()
            .with_node(Node::vulnerability("CVE-1", 2.0))
            .with_node(Node::vulnerability("CVE-2", 1.0))
            .with_node(Node::new(NodeType::Vulnerability, "CVE-3"))
            .with_node(Node::new(NodeType::Product, "p1"))
            .with_node(Node::new(NodeType::ThreatReport, "r1"))
            .with_node(Node::new(NodeType::ThreatReport, "r2"))
            .with_edge(Edge::affects("CVE-1", "p1"))
            .with_edge(Edge::affects("CVE-2", "p1"))
            .with_edge(Edge::affects("CVE-3", "p1"))
            .with_edge(Edge::references("r1", "CVE-1"))
            .with_edge(Edge::references("r1", "CVE-2"))
            .with_edge(Edge::references("r2", "CVE-2"));

        let result = score(&graph, &RiskConfig::default());
        let p1 = risk_of(&result, "p1");
        assert_eq!(p1.vulnerability_count, 3);
        // Missing severity counts as 0
        assert_eq!(p1.severity_sum, 3.0);
        // r1 is counted once
        assert_eq!(p1.threat_report_count, 2);
        assert_eq!(p1.normalized_pagerank, 1.0);

        let expected = 3.0 * (1.0 + 3.0_f64.ln());
        assert!((p1.risk_score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_score_is_clamped() {
        let graph = InMemoryGraph::new()
            .with_node(Node::vulnerability("CVE-1", 9.8))
            .with_node(Node::vulnerability("CVE-2", 7.5))
            .with_node(Node::new(NodeType::Product, "p1"))
            .with_edge(Edge::affects("CVE-1", "p1"))
            .with_edge(Edge::affects("CVE-2", "p1"));

        let result = score(&graph, &RiskConfig::default());
        assert_eq!(risk_of(&result, "p1").risk_score, MAX_RISK);
        assert!(risk_of(&result, "p1").base_risk > MAX_RISK);
    }

    #[test]
    fn test_pagerank_normalization() {
        let graph = InMemoryGraph::new()
            .with_node(Node::vulnerability("CVE-1", 4.0))
            .with_node(Node::new(NodeType::Product, "p1"))
            .with_node(Node::new(NodeType::Product, "p2"))
            .with_edge(Edge::affects("CVE-1", "p1"))
            .with_edge(Edge::affects("CVE-1", "p2"));
        let projection = project(&graph);

        // indices: CVE-1 = 0, p1 = 1, p2 = 2
        let pagerank = vec![0.15, 2.0, 0.5];
        let config = RiskConfig {
            community_weight: 0.0,
            ..Default::default()
        };
        let result = score_products(&projection, &pagerank, &[0, 1, 2], &config);

        assert_eq!(risk_of(&result, "p1").risk_score, 4.0);
        assert_eq!(risk_of(&result, "p2").risk_score, 1.0);
        assert_eq!(result.ranked()[0].product_id, "p1");
    }

    #[test]
    fn test_higher_severity_never_lowers_risk() {
        let build = |severity: f64| {
            InMemoryGraph::new()
                .with_node(Node::vulnerability("CVE-1", severity))
                .with_node(Node::vulnerability("CVE-2", 1.5))
                .with_node(Node::new(NodeType::Product, "p1"))
                .with_node(Node::new(NodeType::Product, "p2"))
                .with_edge(Edge::affects("CVE-1", "p1"))
                .with_edge(Edge::affects("CVE-2", "p2"))
        };

        let mut previous = (0.0, 0.0);
        for severity in [0.0, 0.5, 1.0, 2.0, 3.5, 6.0, 9.9] {
            let result = score(&build(severity), &RiskConfig::default());
            let current = (
                risk_of(&result, "p1").risk_score,
                risk_of(&result, "p2").risk_score,
            );
            assert!(current.0 >= previous.0, "p1 dropped at severity {}", severity);
            // p2 shares p1's community, so it may only go up as well
            assert!(current.1 >= previous.1, "p2 dropped at severity {}", severity);
            previous = current;
        }
    }

    fn two_product_community() -> InMemoryGraph {
        InMemoryGraph::new()
            .with_node(Node::vulnerability("CVE-1", 4.0))
            .with_node(Node::vulnerability("CVE-2", 2.0))
            .with_node(Node::new(NodeType::Product, "p1"))
            .with_node(Node::new(NodeType::Product, "p2"))
            .with_edge(Edge::affects("CVE-1", "p1"))
            .with_edge(Edge::affects("CVE-2", "p2"))
    }

    #[test]
    fn test_community_term_fixed_point() {
        let config = RiskConfig {
            tolerance: 1e-12,
            max_iterations: 100,
            ..Default::default()
        };
        let result = score(&two_product_community(), &config);
        assert!(result.converged);

        // r1 = 4 + 0.1 r2, r2 = 2 + 0.1 r1
        let r1 = (4.0 + 0.1 * 2.0) / (1.0 - 0.01);
        let r2 = (2.0 + 0.1 * 4.0) / (1.0 - 0.01);
        assert!((risk_of(&result, "p1").risk_score - r1).abs() < 1e-9);
        assert!((risk_of(&result, "p2").risk_score - r2).abs() < 1e-9);
        assert!((risk_of(&result, "p1").community_risk - 0.1 * r2).abs() < 1e-9);
    }

    #[test]
    fn test_default_cap_and_convergence_flag() {
        let result = score(&two_product_community(), &RiskConfig::default());
        // Deltas 0.4, 0.04, 0.004, 0.0004
        assert!(result.converged);
        assert_eq!(result.iterations, 4);

        let capped = score(
            &two_product_community(),
            &RiskConfig {
                max_iterations: 1,
                ..Default::default()
            },
        );
        assert!(!capped.converged);
        assert_eq!(capped.iterations, 1);
        assert!((risk_of(&capped, "p1").risk_score - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_separate_communities_do_not_interact() {
        let projection = project(&two_product_community());
        let n = projection.node_count();
        let community: Vec<usize> = (0..n).collect();
        let result = score_products(&projection, &vec![1.0; n], &community, &RiskConfig::default());

        assert_eq!(risk_of(&result, "p1").risk_score, 4.0);
        assert_eq!(risk_of(&result, "p2").risk_score, 2.0);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_no_products() {
        let graph = InMemoryGraph::new().with_node(Node::vulnerability("CVE-1", 4.0));
        let result = score(&graph, &RiskConfig::default());
        assert!(result.products.is_empty());
        assert!(result.converged);
    }
}
