pub mod common;
pub mod pagerank;
pub mod pathfinding;
pub mod centrality;
pub mod community;
pub mod similarity;

pub use common::{GraphView, NodeId};
pub use pagerank::{page_rank, page_rank_with_interrupt, PageRankConfig, PageRankResult};
pub use centrality::{
    betweenness_centrality, betweenness_centrality_with_interrupt, BetweennessConfig,
    BetweennessResult,
};
pub use community::{
    louvain, louvain_with_interrupt, modularity, weakly_connected_components, LouvainConfig,
    LouvainResult, WccResult,
};
pub use similarity::{
    jaccard, node_similarity, node_similarity_with_interrupt, SimilarityConfig, SimilarityResult,
};
pub use pathfinding::{AdjacencyList, ShortestPathDag};
