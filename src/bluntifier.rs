use crate::adjacency_components::compute_all_adjacency_components;
use crate::biclique_cover::{compute_biclique_cover, Bipartition};
use crate::bidirected_graph::{BiEdge, Handle};
use crate::bidirected_ops::BidirectedGraph;
use crate::duplicator::Duplicator;
use crate::error::Result;
use crate::gfa::{read_gfa, IncrementalIdMap};
use crate::node_info::{map_splice_sites_by_node, BicliqueEdgeIndex, Bicliques};
use crate::overlap_map::OverlapMap;
use crate::poa::{align_biclique_overlaps, harmonize_biclique_orientations, splice_subgraphs, Subgraph};
use crate::overlapping_overlap::splice_overlapping_overlaps;
use crate::provenance::{compute_provenance, ProvenanceMap};
use log::info;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::BufRead;

/// Drives the full overlap-resolution pipeline over one graph.
pub struct Bluntifier {
    pub graph: BidirectedGraph,
    pub id_map: IncrementalIdMap,
    pub overlaps: OverlapMap,
    pub bicliques: Bicliques,
    pub node_to_biclique_edge: Vec<Vec<BicliqueEdgeIndex>>,
    pub duplicator: Duplicator,
    pub to_be_destroyed: HashSet<usize>,
    pub provenance: ProvenanceMap,
    input_node_count: usize,
}

impl Bluntifier {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let (graph, id_map, overlaps) = read_gfa(reader)?;
        let input_node_count = id_map.len();
        Ok(Bluntifier {
            graph,
            id_map,
            overlaps,
            bicliques: Bicliques::default(),
            node_to_biclique_edge: Vec::new(),
            duplicator: Duplicator::new(),
            to_be_destroyed: HashSet::new(),
            provenance: ProvenanceMap::new(),
            input_node_count,
        })
    }

    /// Resolve every overlap: adjacency components, biclique covers,
    /// terminus duplication, per-biclique POA, splicing, overlapping
    /// overlaps, provenance, and finally terminus destruction.
    pub fn bluntify(&mut self) -> Result<()> {
        let adjacency_components = compute_all_adjacency_components(&self.graph, &self.overlaps);
        info!("total adjacency components: {}", adjacency_components.len());

        // Biclique covers are independent per component; the cover set is
        // deterministic, the index order is not guaranteed and nothing
        // downstream relies on it
        let graph = &self.graph;
        let overlaps = &self.overlaps;
        let covers: Vec<Vec<Vec<BiEdge>>> = adjacency_components
            .par_iter()
            .filter(|component| !component.is_trivial())
            .map(|component| -> Result<Vec<Vec<BiEdge>>> {
                let mut blocks = Vec::new();
                component.decompose_into_bipartite_blocks(graph, overlaps, |block| {
                    blocks.push(block);
                });

                let mut component_bicliques = Vec::new();
                for block in blocks {
                    let cover = compute_biclique_cover(&block);
                    component_bicliques
                        .extend(deduplicate_and_canonicalize_biclique_cover(cover, overlaps)?);
                }
                Ok(component_bicliques)
            })
            .collect::<Result<Vec<_>>>()?;

        self.bicliques = Bicliques {
            bicliques: covers.into_iter().flatten().collect(),
        };
        info!("total bicliques: {}", self.bicliques.len());

        self.node_to_biclique_edge =
            map_splice_sites_by_node(&self.bicliques, self.input_node_count);

        self.duplicator.duplicate_all_node_termini(
            &mut self.graph,
            &mut self.bicliques,
            &mut self.overlaps,
            &self.node_to_biclique_edge,
            self.input_node_count,
        )?;

        harmonize_biclique_orientations(&mut self.bicliques);

        // POA per biclique reads the graph; copying in is serialised below
        let graph = &self.graph;
        let bicliques = &self.bicliques;
        let subgraphs: Vec<Subgraph> = (0..bicliques.len())
            .into_par_iter()
            .map(|index| align_biclique_overlaps(graph, bicliques, index))
            .collect::<Result<Vec<_>>>()?;

        splice_subgraphs(
            &mut self.graph,
            &subgraphs,
            &self.duplicator,
            &mut self.to_be_destroyed,
        )?;

        splice_overlapping_overlaps(&mut self.graph, &self.duplicator, &mut self.to_be_destroyed)?;

        self.provenance = compute_provenance(
            &self.graph,
            &self.bicliques,
            &self.overlaps,
            &self.node_to_biclique_edge,
            &self.duplicator,
            &self.to_be_destroyed,
            self.input_node_count,
        )?;

        for &node_id in &self.to_be_destroyed {
            self.graph.destroy_handle(Handle::forward(node_id));
        }
        info!(
            "bluntified graph: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edges.len()
        );
        Ok(())
    }
}

/// Sort the bicliques largest first and assign each edge, in its stored
/// canonical form, to the first biclique that contains it: repeated edges
/// land in the larger POA where alignment is cheaper overall.
pub fn deduplicate_and_canonicalize_biclique_cover(
    mut cover: Vec<Bipartition>,
    overlaps: &OverlapMap,
) -> Result<Vec<Vec<BiEdge>>> {
    cover.sort_by(|a, b| b.size().cmp(&a.size()));

    let mut seen: HashSet<BiEdge> = HashSet::new();
    let mut deduplicated = Vec::new();
    for biclique in &cover {
        let mut edges = Vec::new();
        for &left in &biclique.left {
            for &right in &biclique.right {
                let edge = BiEdge::new(left, right.flip());
                let (stored, _) = overlaps.canonicalize_and_find(edge)?;
                if seen.insert(stored) {
                    edges.push(stored);
                }
            }
        }
        if !edges.is_empty() {
            deduplicated.push(edges);
        }
    }
    Ok(deduplicated)
}
