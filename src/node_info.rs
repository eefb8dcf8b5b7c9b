use crate::bidirected_graph::BiEdge;
use crate::error::Result;
use crate::overlap_map::OverlapMap;
use std::collections::BTreeMap;

/// Position of one edge inside the deduplicated biclique collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BicliqueEdgeIndex {
    pub biclique_index: usize,
    pub edge_index: usize,
}

/// The deduplicated biclique cover of the whole graph: edges are stored in
/// their canonical (overlap map) form, each edge in exactly one biclique.
#[derive(Debug, Default, Clone)]
pub struct Bicliques {
    pub bicliques: Vec<Vec<BiEdge>>,
}

impl Bicliques {
    pub fn len(&self) -> usize {
        self.bicliques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bicliques.is_empty()
    }

    pub fn edge(&self, index: BicliqueEdgeIndex) -> BiEdge {
        self.bicliques[index.biclique_index][index.edge_index]
    }

    pub fn get(&self, biclique_index: usize) -> &[BiEdge] {
        &self.bicliques[biclique_index]
    }
}

/// One overlap a node participates in: the edge's position inside its
/// biclique and the overlap length on this node's side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapInfo {
    pub edge_index: usize,
    pub length: usize,
}

pub const LEFT: usize = 0;
pub const RIGHT: usize = 1;

/// Per-node factoring of overlaps: side -> biclique -> overlaps, each list
/// sorted by length descending.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub node_id: usize,
    pub factored_overlaps: [BTreeMap<usize, Vec<OverlapInfo>>; 2],
}

impl NodeInfo {
    pub fn new(
        node_to_biclique_edge: &[Vec<BicliqueEdgeIndex>],
        bicliques: &Bicliques,
        overlaps: &OverlapMap,
        node_id: usize,
    ) -> Result<Self> {
        Self::build(node_to_biclique_edge, bicliques, overlaps, node_id, |id| id)
    }

    /// Factoring variant used after duplication: biclique edges now point at
    /// child nodes, so endpoints are resolved through the child registry to
    /// decide whether they belong to this (parent) node.
    pub fn with_parent_lookup<F>(
        node_to_biclique_edge: &[Vec<BicliqueEdgeIndex>],
        bicliques: &Bicliques,
        overlaps: &OverlapMap,
        node_id: usize,
        resolve: F,
    ) -> Result<Self>
    where
        F: Fn(usize) -> usize,
    {
        Self::build(node_to_biclique_edge, bicliques, overlaps, node_id, resolve)
    }

    fn build<F>(
        node_to_biclique_edge: &[Vec<BicliqueEdgeIndex>],
        bicliques: &Bicliques,
        overlaps: &OverlapMap,
        node_id: usize,
        resolve: F,
    ) -> Result<Self>
    where
        F: Fn(usize) -> usize,
    {
        let mut info = NodeInfo {
            node_id,
            factored_overlaps: [BTreeMap::new(), BTreeMap::new()],
        };

        for index in &node_to_biclique_edge[node_id] {
            let edge = bicliques.edge(*index);
            let (stored, lengths) = overlaps.canonicalize_and_compute_lengths(edge)?;

            // Overlap side assignment: the canonical source endpoint carries
            // the overlap on its right when forward, on its left when
            // reversed; the sink endpoint is symmetric.
            if resolve(stored.from.node_id()) == node_id {
                let side = if stored.from.is_reverse() { LEFT } else { RIGHT };
                info.factored_overlaps[side]
                    .entry(index.biclique_index)
                    .or_default()
                    .push(OverlapInfo {
                        edge_index: index.edge_index,
                        length: lengths.0,
                    });
            }
            if resolve(stored.to.node_id()) == node_id {
                let side = if stored.to.is_reverse() { RIGHT } else { LEFT };
                info.factored_overlaps[side]
                    .entry(index.biclique_index)
                    .or_default()
                    .push(OverlapInfo {
                        edge_index: index.edge_index,
                        length: lengths.1,
                    });
            }
        }

        for side in [LEFT, RIGHT] {
            for infos in info.factored_overlaps[side].values_mut() {
                infos.sort_by(|a, b| b.length.cmp(&a.length));
            }
        }

        Ok(info)
    }

    /// Longest overlap of one biclique on one side of this node
    pub fn biclique_extent(&self, side: usize, biclique_index: usize) -> Option<usize> {
        self.factored_overlaps[side]
            .get(&biclique_index)
            .map(|infos| infos[0].length)
    }

    /// Rank the bicliques on each side by their longest participating
    /// overlap, longest first; duplication peels the longest piece
    /// outermost. Returns (sizes, biclique indices), aligned.
    pub fn get_sorted_biclique_extents(&self) -> ([Vec<usize>; 2], [Vec<usize>; 2]) {
        let mut sizes: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        let mut biclique_order: [Vec<usize>; 2] = [Vec::new(), Vec::new()];

        for side in [LEFT, RIGHT] {
            let mut extents: Vec<(usize, usize)> = self.factored_overlaps[side]
                .iter()
                .map(|(&biclique, infos)| (biclique, infos[0].length))
                .collect();
            extents.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            for (biclique, size) in extents {
                biclique_order[side].push(biclique);
                sizes[side].push(size);
            }
        }
        (sizes, biclique_order)
    }

    /// Largest overlap on one side, zero when the side is untouched
    pub fn max_overlap(&self, side: usize) -> usize {
        self.factored_overlaps[side]
            .values()
            .map(|infos| infos[0].length)
            .max()
            .unwrap_or(0)
    }
}

/// Record every node's participating edges per biclique. A self-loop maps
/// to its node once.
pub fn map_splice_sites_by_node(
    bicliques: &Bicliques,
    node_count: usize,
) -> Vec<Vec<BicliqueEdgeIndex>> {
    let mut node_to_biclique_edge: Vec<Vec<BicliqueEdgeIndex>> = vec![Vec::new(); node_count + 1];
    for (i, biclique) in bicliques.bicliques.iter().enumerate() {
        for (j, edge) in biclique.iter().enumerate() {
            let index = BicliqueEdgeIndex {
                biclique_index: i,
                edge_index: j,
            };
            let left_id = edge.from.node_id();
            let right_id = edge.to.node_id();
            node_to_biclique_edge[left_id].push(index);
            if right_id != left_id {
                node_to_biclique_edge[right_id].push(index);
            }
        }
    }
    node_to_biclique_edge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidirected_graph::Handle;
    use crate::cigar::Cigar;

    fn edge(a: usize, ar: bool, b: usize, br: bool) -> BiEdge {
        BiEdge::new(Handle::new(a, ar), Handle::new(b, br))
    }

    fn setup_fork() -> (Bicliques, OverlapMap, Vec<Vec<BicliqueEdgeIndex>>) {
        // Node 1 overlaps nodes 2 and 3 off its right side, one biclique
        let e12 = edge(1, false, 2, false);
        let e13 = edge(1, false, 3, false);
        let mut overlaps = OverlapMap::new();
        overlaps.insert(e12, Cigar::from_str("2M").unwrap());
        overlaps.insert(e13, Cigar::from_str("3M").unwrap());
        let bicliques = Bicliques {
            bicliques: vec![vec![e12, e13]],
        };
        let map = map_splice_sites_by_node(&bicliques, 3);
        (bicliques, overlaps, map)
    }

    #[test]
    fn test_factoring_sides_and_sorting() {
        let (bicliques, overlaps, map) = setup_fork();

        let info = NodeInfo::new(&map, &bicliques, &overlaps, 1).unwrap();
        // Node 1 is the source of both edges: overlaps on its right side
        assert!(info.factored_overlaps[LEFT].is_empty());
        let infos = &info.factored_overlaps[RIGHT][&0];
        assert_eq!(infos.len(), 2);
        // Sorted longest first
        assert_eq!(infos[0].length, 3);
        assert_eq!(infos[1].length, 2);

        let info2 = NodeInfo::new(&map, &bicliques, &overlaps, 2).unwrap();
        assert_eq!(info2.factored_overlaps[LEFT][&0][0].length, 2);
        assert!(info2.factored_overlaps[RIGHT].is_empty());
    }

    #[test]
    fn test_reversed_endpoint_swaps_side() {
        // Edge (1-, 2+): node 1 reversed as source puts the overlap on the
        // node's left side
        let e = edge(1, true, 2, false);
        let mut overlaps = OverlapMap::new();
        overlaps.insert(e, Cigar::from_str("2M").unwrap());
        let bicliques = Bicliques {
            bicliques: vec![vec![e]],
        };
        let map = map_splice_sites_by_node(&bicliques, 2);

        let info = NodeInfo::new(&map, &bicliques, &overlaps, 1).unwrap();
        assert!(info.factored_overlaps[RIGHT].is_empty());
        assert_eq!(info.factored_overlaps[LEFT][&0][0].length, 2);
    }

    #[test]
    fn test_palindromic_self_loop_maps_once_factors_twice() {
        let e = edge(1, false, 1, true);
        let mut overlaps = OverlapMap::new();
        overlaps.insert(e, Cigar::from_str("2M").unwrap());
        let bicliques = Bicliques {
            bicliques: vec![vec![e]],
        };
        let map = map_splice_sites_by_node(&bicliques, 1);
        // Self-loop registered once in the splice-site map
        assert_eq!(map[1].len(), 1);

        let info = NodeInfo::new(&map, &bicliques, &overlaps, 1).unwrap();
        // Both endpoints land on the right side: 1+ as source, 1- as sink
        assert_eq!(info.factored_overlaps[RIGHT][&0].len(), 2);
        assert!(info.factored_overlaps[LEFT].is_empty());
    }

    #[test]
    fn test_sorted_biclique_extents() {
        let e12 = edge(1, false, 2, false);
        let e13 = edge(1, false, 3, false);
        let mut overlaps = OverlapMap::new();
        overlaps.insert(e12, Cigar::from_str("2M").unwrap());
        overlaps.insert(e13, Cigar::from_str("3M").unwrap());
        // Two bicliques on the same side with different extents
        let bicliques = Bicliques {
            bicliques: vec![vec![e12], vec![e13]],
        };
        let map = map_splice_sites_by_node(&bicliques, 3);
        let info = NodeInfo::new(&map, &bicliques, &overlaps, 1).unwrap();

        let (sizes, order) = info.get_sorted_biclique_extents();
        assert_eq!(sizes[RIGHT], vec![3, 2]);
        assert_eq!(order[RIGHT], vec![1, 0]);
        assert!(sizes[LEFT].is_empty());
        assert_eq!(info.max_overlap(RIGHT), 3);
    }

    #[test]
    fn test_parent_lookup_groups_child_edges() {
        // After duplication the biclique edge points at child node 9 whose
        // parent is node 1
        let e = edge(9, false, 2, false);
        let mut overlaps = OverlapMap::new();
        overlaps.insert(e, Cigar::from_str("2M").unwrap());
        let bicliques = Bicliques {
            bicliques: vec![vec![e]],
        };
        let mut map = map_splice_sites_by_node(&bicliques, 9);
        // Provenance indexes the map by the parent id
        map[1] = map[9].clone();

        let info = NodeInfo::with_parent_lookup(&map, &bicliques, &overlaps, 1, |id| {
            if id == 9 {
                1
            } else {
                id
            }
        })
        .unwrap();
        assert_eq!(info.factored_overlaps[RIGHT][&0][0].length, 2);
    }
}
