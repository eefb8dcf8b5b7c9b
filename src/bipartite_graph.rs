use crate::adjacency_components::AdjacencyComponent;
use crate::bidirected_graph::{BiEdge, Handle};
use crate::bidirected_ops::BidirectedGraph;
use crate::overlap_map::OverlapMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// The sides reachable from side `h` by crossing one overlapped edge
pub fn adjacent_sides(
    graph: &BidirectedGraph,
    overlaps: &OverlapMap,
    h: Handle,
) -> Vec<Handle> {
    let mut result: Vec<Handle> = graph
        .edges_from(h)
        .into_iter()
        .filter(|&t| {
            overlaps
                .canonicalize_and_find(BiEdge::new(h, t))
                .map(|(_, cigar)| !cigar.has_empty_side())
                .unwrap_or(false)
        })
        .map(|t| t.flip())
        .collect();
    result.sort();
    result.dedup();
    result
}

/// A bipartite block of an adjacency component: two disjoint groups of node
/// sides with every overlapped edge crossing between them. Adjacency is
/// captured at construction as index lists, so cover algorithms never touch
/// the underlying graph.
#[derive(Debug, Clone)]
pub struct BipartiteGraph {
    pub left: Vec<Handle>,
    pub right: Vec<Handle>,
    /// For each left node, the sorted indices of its right neighbours
    pub left_adj: Vec<Vec<usize>>,
    /// For each right node, the sorted indices of its left neighbours
    pub right_adj: Vec<Vec<usize>>,
}

impl BipartiteGraph {
    pub fn new(
        graph: &BidirectedGraph,
        overlaps: &OverlapMap,
        mut left: Vec<Handle>,
        mut right: Vec<Handle>,
    ) -> Self {
        left.sort();
        left.dedup();
        right.sort();
        right.dedup();

        let right_index: HashMap<Handle, usize> =
            right.iter().enumerate().map(|(i, &h)| (h, i)).collect();

        let mut left_adj = vec![Vec::new(); left.len()];
        let mut right_adj = vec![Vec::new(); right.len()];
        for (i, &l) in left.iter().enumerate() {
            for side in adjacent_sides(graph, overlaps, l) {
                if let Some(&j) = right_index.get(&side) {
                    left_adj[i].push(j);
                }
            }
            left_adj[i].sort_unstable();
            left_adj[i].dedup();
            for &j in &left_adj[i] {
                right_adj[j].push(i);
            }
        }
        for adj in &mut right_adj {
            adj.sort_unstable();
            adj.dedup();
        }

        BipartiteGraph {
            left,
            right,
            left_adj,
            right_adj,
        }
    }

    pub fn left_size(&self) -> usize {
        self.left.len()
    }

    pub fn right_size(&self) -> usize {
        self.right.len()
    }

    pub fn edge_count(&self) -> usize {
        self.left_adj.iter().map(|a| a.len()).sum()
    }

    /// Enumerate the block's edges as graph edges `(l, flip(r))`
    pub fn edges(&self) -> Vec<BiEdge> {
        let mut edges = Vec::with_capacity(self.edge_count());
        for (i, adj) in self.left_adj.iter().enumerate() {
            for &j in adj {
                edges.push(BiEdge::new(self.left[i], self.right[j].flip()));
            }
        }
        edges
    }
}

impl AdjacencyComponent {
    /// Split this component into bipartite blocks, streamed through the
    /// callback. Sides on an odd cycle (including self-adjacent sides from
    /// reversing self-loops) are duplicated into both groups; the duplicated
    /// termini are resolved independently by the duplicator later.
    pub fn decompose_into_bipartite_blocks<F>(
        &self,
        graph: &BidirectedGraph,
        overlaps: &OverlapMap,
        mut callback: F,
    ) where
        F: FnMut(BipartiteGraph),
    {
        let member: HashSet<Handle> = self.handles.iter().copied().collect();
        let mut color: HashMap<Handle, bool> = HashMap::new();
        let mut duplicated: HashSet<Handle> = HashSet::new();

        for &start in &self.handles {
            if color.contains_key(&start) {
                continue;
            }
            color.insert(start, false);
            let mut queue = VecDeque::from([start]);
            let mut block_members = vec![start];

            while let Some(side) = queue.pop_front() {
                let side_color = color[&side];
                for nbr in adjacent_sides(graph, overlaps, side) {
                    if !member.contains(&nbr) {
                        continue;
                    }
                    if nbr == side {
                        duplicated.insert(side);
                        continue;
                    }
                    match color.get(&nbr) {
                        None => {
                            color.insert(nbr, !side_color);
                            block_members.push(nbr);
                            queue.push_back(nbr);
                        }
                        Some(&c) if c == side_color => {
                            duplicated.insert(nbr);
                        }
                        Some(_) => {}
                    }
                }
            }

            let mut left = Vec::new();
            let mut right = Vec::new();
            for &h in &block_members {
                let c = color[&h];
                if !c || duplicated.contains(&h) {
                    left.push(h);
                }
                if c || duplicated.contains(&h) {
                    right.push(h);
                }
            }
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let block = BipartiteGraph::new(graph, overlaps, left, right);
            if block.edge_count() > 0 {
                callback(block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency_components::compute_all_adjacency_components;
    use crate::cigar::Cigar;

    fn build_fork() -> (BidirectedGraph, OverlapMap) {
        let mut graph = BidirectedGraph::new();
        graph.add_node(1, b"AAGT".to_vec());
        graph.add_node(2, b"GTCC".to_vec());
        graph.add_node(3, b"GTTT".to_vec());
        let mut overlaps = OverlapMap::new();
        for to in [2, 3] {
            let edge = BiEdge::new(Handle::forward(1), Handle::forward(to));
            graph.create_edge(edge.from, edge.to);
            overlaps.insert(edge, Cigar::from_str("2M").unwrap());
        }
        (graph, overlaps)
    }

    #[test]
    fn test_fork_decomposes_into_one_block() {
        let (graph, overlaps) = build_fork();
        let components = compute_all_adjacency_components(&graph, &overlaps);
        let component = components.iter().find(|c| !c.is_trivial()).unwrap();

        let mut blocks = Vec::new();
        component.decompose_into_bipartite_blocks(&graph, &overlaps, |b| blocks.push(b));
        assert_eq!(blocks.len(), 1);

        let block = &blocks[0];
        assert_eq!(block.left_size() + block.right_size(), 3);
        assert_eq!(block.edge_count(), 2);
        // Every edge maps back to an overlap in the map
        for edge in block.edges() {
            assert!(overlaps.canonicalize_and_find(edge).is_ok());
        }
    }

    #[test]
    fn test_self_adjacent_side_duplicates_into_both_groups() {
        let mut graph = BidirectedGraph::new();
        graph.add_node(1, b"ACGT".to_vec());
        let mut overlaps = OverlapMap::new();
        let edge = BiEdge::new(Handle::forward(1), Handle::reverse(1));
        graph.create_edge(edge.from, edge.to);
        overlaps.insert(edge, Cigar::from_str("2M").unwrap());

        let components = compute_all_adjacency_components(&graph, &overlaps);
        let component = components.iter().find(|c| !c.is_trivial()).unwrap();

        let mut blocks = Vec::new();
        component.decompose_into_bipartite_blocks(&graph, &overlaps, |b| blocks.push(b));
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.left, vec![Handle::forward(1)]);
        assert_eq!(block.right, vec![Handle::forward(1)]);
        assert_eq!(block.edges(), vec![BiEdge::new(Handle::forward(1), Handle::reverse(1))]);
    }
}
