pub mod adjacency_components;
pub mod biclique_cover;
pub mod bidirected_graph;
pub mod bidirected_ops;
pub mod bipartite_graph;
pub mod bluntifier;
pub mod cigar;
pub mod duplicator;
pub mod error;
pub mod gfa;
pub mod node_info;
pub mod overlap_map;
pub mod overlapping_overlap;
pub mod poa;
pub mod provenance;

pub use bidirected_graph::{reverse_complement, BiEdge, BiNode, BiPath, Handle};
pub use bidirected_ops::BidirectedGraph;
pub use bluntifier::Bluntifier;
pub use error::{BluntifyError, Result};
