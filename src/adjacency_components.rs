use crate::bidirected_graph::Handle;
use crate::bidirected_ops::BidirectedGraph;
use crate::overlap_map::OverlapMap;
use std::collections::{HashMap, HashSet};
use uf_rush::UFRush;

/// A maximal set of node sides connected by overlapped edges.
///
/// A side is encoded as the handle whose right end it is: handle `n+` is the
/// right side of node `n`, handle `n-` its left side. An edge `(a, b)` joins
/// side `a` with side `flip(b)`.
#[derive(Debug, Clone)]
pub struct AdjacencyComponent {
    pub handles: Vec<Handle>,
    /// Whether any overlapped edge lives inside this component. A reversing
    /// self-loop joins a side to itself, so a single-side component can
    /// still carry an overlap that needs resolving.
    pub has_overlaps: bool,
}

impl AdjacencyComponent {
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Dead ends are skipped downstream
    pub fn is_trivial(&self) -> bool {
        !self.has_overlaps
    }
}

/// Union-find over oriented node sides, packed the same way handles are.
pub struct SideUnionFind {
    uf: UFRush,
}

impl SideUnionFind {
    pub fn new(max_node_id: usize) -> Self {
        // Handles pack as (id << 1) | orientation, so we need room for
        // both orientations of the largest id
        let capacity = (max_node_id << 1) + 2;
        SideUnionFind {
            uf: UFRush::new(capacity),
        }
    }

    pub fn unite(&self, a: Handle, b: Handle) {
        if a != b {
            self.uf.unite(a.as_u64() as usize, b.as_u64() as usize);
        }
    }

    pub fn find(&self, h: Handle) -> usize {
        self.uf.find(h.as_u64() as usize)
    }

    pub fn same(&self, a: Handle, b: Handle) -> bool {
        self.find(a) == self.find(b)
    }
}

/// Partition all node sides into adjacency components. Edges whose overlap
/// consumes zero bases on both sides are already blunt and do not join
/// sides; they pass through the pipeline untouched.
pub fn compute_all_adjacency_components(
    graph: &BidirectedGraph,
    overlaps: &OverlapMap,
) -> Vec<AdjacencyComponent> {
    let uf = SideUnionFind::new(graph.max_node_id());

    let mut overlapped_sides: HashSet<Handle> = HashSet::new();
    for edge in &graph.edges {
        let blunt = overlaps
            .canonicalize_and_find(*edge)
            .map(|(_, cigar)| cigar.has_empty_side())
            .unwrap_or(true);
        if !blunt {
            uf.unite(edge.from, edge.to.flip());
            overlapped_sides.insert(edge.from);
            overlapped_sides.insert(edge.to.flip());
        }
    }

    let mut groups: HashMap<usize, Vec<Handle>> = HashMap::new();
    let mut node_ids: Vec<usize> = graph.nodes.keys().copied().collect();
    node_ids.sort_unstable();
    for node_id in node_ids {
        for handle in [Handle::forward(node_id), Handle::reverse(node_id)] {
            groups.entry(uf.find(handle)).or_default().push(handle);
        }
    }

    let mut components: Vec<AdjacencyComponent> = groups
        .into_values()
        .map(|mut handles| {
            handles.sort();
            let has_overlaps = handles.iter().any(|h| overlapped_sides.contains(h));
            AdjacencyComponent {
                handles,
                has_overlaps,
            }
        })
        .collect();
    components.sort_by_key(|c| c.handles[0]);
    components
}
