//! Threatrank CLI: run security graph analytics over a JSON graph document

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use threatrank::analytics::{AnalyticsReport, Projection};
use threatrank::{AnalyticsConfig, AnalyticsEngine, InMemoryGraph, NodeKey, NodeType};

#[derive(Parser)]
#[command(name = "threatrank", version, about = "Security knowledge graph analytics")]
struct Cli {
    /// YAML analytics configuration
    #[arg(long, global = true, env = "THREATRANK_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analytics pipeline and print the report
    Analyze {
        /// Graph document (JSON with "nodes" and "edges")
        graph: PathBuf,

        /// Entries per report section
        #[arg(long)]
        top_k: Option<usize>,

        /// Run budget in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Also write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show what the configured projection contains
    Inspect {
        graph: PathBuf,
    },
    /// Jaccard neighbors of one node or of every node of a type
    Similar {
        graph: PathBuf,

        #[arg(long)]
        node_type: NodeType,

        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        top_k: Option<usize>,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze { graph, top_k, timeout, output } => {
            run_analyze(cli.config.as_deref(), &graph, top_k, timeout, output.as_deref(), &cli.format).await
        }
        Commands::Inspect { graph } => run_inspect(cli.config.as_deref(), &graph, &cli.format),
        Commands::Similar { graph, node_type, id, top_k } => {
            run_similar(cli.config.as_deref(), &graph, node_type, id.as_deref(), top_k, &cli.format)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AnalyticsConfig::from_yaml_file(path)?,
        None => AnalyticsConfig::default(),
    })
}

async fn run_analyze(
    config_path: Option<&Path>,
    graph_path: &Path,
    top_k: Option<usize>,
    timeout: Option<u64>,
    output: Option<&Path>,
    format: &OutputFormat,
) -> CliResult {
    let mut config = load_config(config_path)?;
    if let Some(top_k) = top_k {
        config.report_top_k = top_k;
    }
    if let Some(timeout) = timeout {
        config.run_timeout_seconds = timeout;
    }

    let graph = InMemoryGraph::from_json_file(graph_path)?;
    let engine = AnalyticsEngine::new(config)?;

    // The pipeline is CPU bound; Ctrl-C flips the flag it polls
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || engine.run_with_cancel(&graph, flag));

    let run = tokio::select! {
        joined = &mut handle => joined?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted, cancelling run...");
            cancel.store(true, Ordering::Relaxed);
            handle.await?
        }
    }?;

    if let Some(path) = output {
        run.report.write_json(path)?;
    }

    match format {
        OutputFormat::Json => println!("{}", run.report.to_json_pretty()?),
        OutputFormat::Table => print_report(&run.report),
    }

    Ok(())
}

fn new_table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.into_iter().map(|h| h.to_string()).collect::<Vec<_>>());
    table
}

fn print_report(report: &AnalyticsReport) {
    let meta = &report.metadata;
    println!(
        "{} nodes, {} edges, {} communities (modularity {:.4})",
        meta.node_count, meta.edge_count, meta.community_count, meta.modularity
    );

    println!("\nProduct risk");
    let mut table = new_table(["Product", "Risk", "Vulns", "Severity sum", "Reports", "Community"]);
    for p in &report.product_risk_scores {
        table.add_row(vec![
            p.product_id.clone(),
            format!("{:.3}", p.risk_score),
            p.vulnerability_count.to_string(),
            format!("{:.1}", p.severity_sum),
            p.threat_report_count.to_string(),
            format!("{:.3}", p.community_risk),
        ]);
    }
    println!("{}", table);

    for (title, ranked) in [
        ("Top nodes by PageRank", &report.top_nodes_by_pagerank),
        ("Top nodes by betweenness", &report.top_nodes_by_betweenness),
    ] {
        println!("\n{}", title);
        let mut table = new_table(["Type", "Id", "Name", "Score"]);
        for node in ranked {
            table.add_row(vec![
                node.node_type.to_string(),
                node.id.clone(),
                node.name.clone(),
                format!("{:.4}", node.score),
            ]);
        }
        println!("{}", table);
    }

    println!("\nCommunities");
    let mut table = new_table(["Id", "Members", "Products", "Representatives"]);
    for c in &report.communities {
        let reps: Vec<String> = c.representatives.iter().map(NodeKey::to_string).collect();
        table.add_row(vec![
            c.community_id.to_string(),
            c.member_count.to_string(),
            c.product_count.to_string(),
            reps.join(", "),
        ]);
    }
    println!("{}", table);

    if !report.warnings.is_empty() {
        println!("\nWarnings");
        for w in &report.warnings {
            println!("  - {}", w);
        }
    }

    let timings: Vec<String> = meta
        .stage_timings
        .iter()
        .map(|t| format!("{} {:.1}ms", t.stage, t.elapsed_ms))
        .collect();
    println!("\n{}", timings.join(" | "));
}

fn run_inspect(config_path: Option<&Path>, graph_path: &Path, format: &OutputFormat) -> CliResult {
    let engine = AnalyticsEngine::new(load_config(config_path)?)?;
    let graph = InMemoryGraph::from_json_file(graph_path)?;
    let projection = engine.project(&graph)?;

    match format {
        OutputFormat::Json => {
            let nodes: serde_json::Map<String, serde_json::Value> = projection
                .type_counts()
                .into_iter()
                .map(|(t, count)| (t.to_string(), count.into()))
                .collect();
            let edges: serde_json::Map<String, serde_json::Value> = projection
                .relation_counts()
                .into_iter()
                .map(|(r, count)| (r.to_string(), count.into()))
                .collect();
            let summary = serde_json::json!({
                "node_count": projection.node_count(),
                "edge_count": projection.edge_count(),
                "nodes": nodes,
                "edges": edges,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            let mut table = new_table(["Kind", "Name", "Count"]);
            for (t, count) in projection.type_counts() {
                table.add_row(vec!["node".to_string(), t.to_string(), count.to_string()]);
            }
            for (r, count) in projection.relation_counts() {
                table.add_row(vec!["edge".to_string(), r.to_string(), count.to_string()]);
            }
            println!("{}", table);
            println!("{} node(s), {} edge(s)", projection.node_count(), projection.edge_count());
        }
    }

    Ok(())
}

fn run_similar(
    config_path: Option<&Path>,
    graph_path: &Path,
    node_type: NodeType,
    id: Option<&str>,
    top_k: Option<usize>,
    format: &OutputFormat,
) -> CliResult {
    let mut config = load_config(config_path)?;
    if let Some(top_k) = top_k {
        config.similarity_top_k = top_k;
    }
    let engine = AnalyticsEngine::new(config)?;
    let graph = InMemoryGraph::from_json_file(graph_path)?;
    let projection = engine.project(&graph)?;
    let result = engine.similar_nodes(&projection);

    let nodes: Vec<usize> = match id {
        Some(id) => {
            let key = NodeKey::new(node_type, id);
            let idx = projection
                .index_of(&key)
                .ok_or_else(|| format!("node {} is not in the projection", key))?;
            vec![idx]
        }
        None => projection.nodes_of_type(node_type),
    };

    let rows = similar_rows(&projection, &result.neighbors, &nodes);

    match format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = rows
                .iter()
                .map(|(node, other, score)| {
                    serde_json::json!({ "node": node, "similar": other, "score": score })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("(no similar nodes)");
                return Ok(());
            }
            let mut table = new_table(["Node", "Similar", "Jaccard"]);
            for (node, other, score) in &rows {
                table.add_row(vec![node.to_string(), other.to_string(), format!("{:.4}", score)]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

fn similar_rows(
    projection: &Projection,
    neighbors: &std::collections::HashMap<u64, Vec<(u64, f64)>>,
    nodes: &[usize],
) -> Vec<(NodeKey, NodeKey, f64)> {
    let mut rows = Vec::new();
    for &idx in nodes {
        let Some(peers) = neighbors.get(&(idx as u64)) else { continue };
        for &(other, score) in peers {
            rows.push((projection.key(idx), projection.key(other as usize), score));
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_path_from_environment() {
        std::env::set_var("THREATRANK_CONFIG", "/etc/threatrank/analytics.yaml");
        let cli = Cli::try_parse_from(["threatrank", "inspect", "graph.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/threatrank/analytics.yaml")));

        let cli = Cli::try_parse_from(["threatrank", "--config", "local.yaml", "inspect", "graph.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("local.yaml")));
        std::env::remove_var("THREATRANK_CONFIG");
    }
}
