use crate::bidirected_graph::Handle;
use crate::bidirected_ops::BidirectedGraph;
use crate::error::{BluntifyError, Result};
use crate::node_info::{BicliqueEdgeIndex, Bicliques, NodeInfo, LEFT, RIGHT};
use crate::overlap_map::OverlapMap;
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Where a terminus child came from: its parent node, the parent side it
/// covers and the covered interval in forward parent coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRecord {
    pub parent: usize,
    pub side: usize,
    pub start: usize,
    pub stop: usize,
}

impl ChildRecord {
    pub fn length(&self) -> usize {
        self.stop - self.start
    }
}

/// A terminus copy belonging to an overlapping-overlap node
#[derive(Debug, Clone, Copy)]
pub struct OverlappingChild {
    pub biclique_index: usize,
    pub handle: Handle,
    pub length: usize,
}

/// Bookkeeping for a node whose left and right overlaps collide
#[derive(Debug, Clone)]
pub struct OverlappingOverlapNodeInfo {
    pub parent_id: usize,
    pub length: usize,
    pub overlapping_children: [Vec<OverlappingChild>; 2],
}

/// Rewrites the graph so that each distinct overlap extent on each node side
/// becomes its own terminus child, and keeps the child registry that the
/// splicer and the provenance tracer consult afterwards.
#[derive(Default)]
pub struct Duplicator {
    pub child_to_parent: HashMap<usize, ChildRecord>,
    pub overlapping_overlap_nodes: HashMap<usize, OverlappingOverlapNodeInfo>,
}

impl Duplicator {
    pub fn new() -> Self {
        Duplicator::default()
    }

    pub fn is_child(&self, node_id: usize) -> bool {
        self.child_to_parent.contains_key(&node_id)
    }

    pub fn resolve_parent(&self, node_id: usize) -> usize {
        self.child_to_parent
            .get(&node_id)
            .map(|r| r.parent)
            .unwrap_or(node_id)
    }

    pub fn is_oo_child(&self, node_id: usize) -> bool {
        self.child_to_parent
            .get(&node_id)
            .map(|r| self.overlapping_overlap_nodes.contains_key(&r.parent))
            .unwrap_or(false)
    }

    pub fn is_oo_parent(&self, node_id: usize) -> bool {
        self.overlapping_overlap_nodes.contains_key(&node_id)
    }

    /// Run terminus duplication for every input node
    pub fn duplicate_all_node_termini(
        &mut self,
        graph: &mut BidirectedGraph,
        bicliques: &mut Bicliques,
        overlaps: &mut OverlapMap,
        node_to_biclique_edge: &[Vec<BicliqueEdgeIndex>],
        input_node_count: usize,
    ) -> Result<()> {
        for node_id in 1..=input_node_count {
            if node_to_biclique_edge[node_id].is_empty() {
                continue;
            }
            let node_info = NodeInfo::new(node_to_biclique_edge, bicliques, overlaps, node_id)?;
            let (sizes, biclique_order) = node_info.get_sorted_biclique_extents();
            if sizes[LEFT].is_empty() && sizes[RIGHT].is_empty() {
                continue;
            }

            let parent_handle = Handle::forward(node_id);
            let parent_length = graph.get_length(parent_handle);

            for side in [LEFT, RIGHT] {
                if let Some(&longest) = sizes[side].first() {
                    if longest > parent_length {
                        return Err(BluntifyError::OverlongOverlap {
                            node: node_id,
                            overlap: longest,
                            length: parent_length,
                        });
                    }
                }
            }

            // The parent path records the surviving pieces in forward order;
            // dividing the node rewrites it in place
            graph.create_path(node_id.to_string(), vec![parent_handle]);

            let max_left = sizes[LEFT].first().copied().unwrap_or(0);
            let max_right = sizes[RIGHT].first().copied().unwrap_or(0);
            if max_left + max_right > parent_length {
                debug!(
                    "node {} is an overlapping overlap ({} + {} > {})",
                    node_id, max_left, max_right, parent_length
                );
                self.handle_overlapping_overlap(
                    graph,
                    bicliques,
                    overlaps,
                    &sizes,
                    &biclique_order,
                    node_id,
                    parent_length,
                )?;
                continue;
            }

            let touched = touched_bicliques(&biclique_order);
            remove_participating_edges(graph, bicliques, &touched, node_id);

            let mut parent_handle = parent_handle;
            let mut parent_node = node_id;

            if sizes[LEFT].len() == 1 && sizes[LEFT][0] == parent_length {
                // The whole node is the terminus; nothing to duplicate
                self.child_to_parent.insert(
                    node_id,
                    ChildRecord {
                        parent: node_id,
                        side: LEFT,
                        start: 0,
                        stop: parent_length,
                    },
                );
                continue;
            }

            if !sizes[LEFT].is_empty() {
                let children = duplicate_prefix(graph, &sizes[LEFT], parent_handle);

                let mut terminus_for: [HashMap<usize, Handle>; 2] =
                    [HashMap::new(), HashMap::new()];
                for (i, &biclique) in biclique_order[LEFT].iter().enumerate() {
                    terminus_for[LEFT].insert(biclique, children[i + 1]);
                    self.child_to_parent.insert(
                        children[i + 1].node_id(),
                        ChildRecord {
                            parent: node_id,
                            side: LEFT,
                            start: 0,
                            stop: sizes[LEFT][i],
                        },
                    );
                }
                rewire_biclique_edges(
                    bicliques,
                    overlaps,
                    parent_node,
                    &terminus_for,
                    Some(children[0]),
                    &touched,
                )?;

                parent_handle = children[0];
                parent_node = parent_handle.node_id();
            }

            if !sizes[RIGHT].is_empty() {
                let remaining = graph.get_length(parent_handle);
                if sizes[RIGHT].len() == 1 && sizes[RIGHT][0] == remaining {
                    // Trivial case: the whole remaining piece is the terminus
                    self.child_to_parent.insert(
                        parent_node,
                        ChildRecord {
                            parent: node_id,
                            side: RIGHT,
                            start: parent_length - sizes[RIGHT][0],
                            stop: parent_length,
                        },
                    );
                    continue;
                }

                let children = duplicate_suffix(graph, &sizes[RIGHT], parent_handle);

                let mut terminus_for: [HashMap<usize, Handle>; 2] =
                    [HashMap::new(), HashMap::new()];
                for (i, &biclique) in biclique_order[RIGHT].iter().enumerate() {
                    terminus_for[RIGHT].insert(biclique, children[i + 1]);
                    self.child_to_parent.insert(
                        children[i + 1].node_id(),
                        ChildRecord {
                            parent: node_id,
                            side: RIGHT,
                            start: parent_length - sizes[RIGHT][i],
                            stop: parent_length,
                        },
                    );
                }
                rewire_biclique_edges(
                    bicliques,
                    overlaps,
                    parent_node,
                    &terminus_for,
                    Some(children[0]),
                    &touched,
                )?;
            }
        }
        Ok(())
    }

    /// Overlapping overlaps keep the parent whole: every terminus becomes a
    /// floating copy, and the post-POA splicer cuts the parent instead.
    #[allow(clippy::too_many_arguments)]
    fn handle_overlapping_overlap(
        &mut self,
        graph: &mut BidirectedGraph,
        bicliques: &mut Bicliques,
        overlaps: &mut OverlapMap,
        sizes: &[Vec<usize>; 2],
        biclique_order: &[Vec<usize>; 2],
        node_id: usize,
        parent_length: usize,
    ) -> Result<()> {
        let touched = touched_bicliques(biclique_order);
        remove_participating_edges(graph, bicliques, &touched, node_id);

        let sequence = graph
            .get_sequence(Handle::forward(node_id))
            .unwrap_or_default();

        let mut info = OverlappingOverlapNodeInfo {
            parent_id: node_id,
            length: parent_length,
            overlapping_children: [Vec::new(), Vec::new()],
        };
        let mut terminus_for: [HashMap<usize, Handle>; 2] = [HashMap::new(), HashMap::new()];

        for side in [LEFT, RIGHT] {
            for (i, &biclique) in biclique_order[side].iter().enumerate() {
                let length = sizes[side][i];
                let (start, stop) = if side == LEFT {
                    (0, length)
                } else {
                    (parent_length - length, parent_length)
                };
                let child = graph.create_handle(sequence[start..stop].to_vec());
                terminus_for[side].insert(biclique, child);
                self.child_to_parent.insert(
                    child.node_id(),
                    ChildRecord {
                        parent: node_id,
                        side,
                        start,
                        stop,
                    },
                );
                info.overlapping_children[side].push(OverlappingChild {
                    biclique_index: biclique,
                    handle: child,
                    length,
                });
            }
        }

        rewire_biclique_edges(bicliques, overlaps, node_id, &terminus_for, None, &touched)?;
        self.overlapping_overlap_nodes.insert(node_id, info);
        Ok(())
    }
}

fn touched_bicliques(biclique_order: &[Vec<usize>; 2]) -> BTreeSet<usize> {
    biclique_order
        .iter()
        .flat_map(|side| side.iter().copied())
        .collect()
}

/// Destroy the graph edges of every biclique the node participates in; the
/// POA splicer replaces them with blunt structure later.
fn remove_participating_edges(
    graph: &mut BidirectedGraph,
    bicliques: &Bicliques,
    touched: &BTreeSet<usize>,
    parent_node: usize,
) {
    for &biclique in touched {
        for edge in bicliques.get(biclique) {
            if edge.from.node_id() == parent_node || edge.to.node_id() == parent_node {
                graph.destroy_edge(*edge);
            }
        }
    }
}

/// Which side of its node an edge endpoint sits on
fn endpoint_side(is_from: bool, is_reverse: bool) -> usize {
    match (is_from, is_reverse) {
        (true, false) => RIGHT,
        (true, true) => LEFT,
        (false, false) => LEFT,
        (false, true) => RIGHT,
    }
}

/// Redirect every biclique edge endpoint that touches `old_node` onto the
/// terminus child for its (side, biclique), or onto `fallback` (the piece
/// retaining the untouched side) when that side was not duplicated in this
/// pass. Endpoint orientation is preserved. Overlap entries are re-keyed.
fn rewire_biclique_edges(
    bicliques: &mut Bicliques,
    overlaps: &mut OverlapMap,
    old_node: usize,
    terminus_for: &[HashMap<usize, Handle>; 2],
    fallback: Option<Handle>,
    touched: &BTreeSet<usize>,
) -> Result<()> {
    for &biclique in touched {
        for edge_index in 0..bicliques.get(biclique).len() {
            let old_edge = bicliques.bicliques[biclique][edge_index];
            let mut new_edge = old_edge;

            for is_from in [true, false] {
                let endpoint = if is_from { old_edge.from } else { old_edge.to };
                if endpoint.node_id() != old_node {
                    continue;
                }
                let side = endpoint_side(is_from, endpoint.is_reverse());
                let target = terminus_for[side]
                    .get(&biclique)
                    .copied()
                    .or(fallback)
                    .ok_or(BluntifyError::NotFound {
                        edge: old_edge.to_string(),
                    })?;
                let redirected = if endpoint.is_reverse() {
                    target.flip()
                } else {
                    target
                };
                if is_from {
                    new_edge.from = redirected;
                } else {
                    new_edge.to = redirected;
                }
            }

            if new_edge != old_edge {
                debug!("rewiring {} to {}", old_edge, new_edge);
                overlaps.update_edge(old_edge, new_edge)?;
                bicliques.bicliques[biclique][edge_index] = new_edge;
            }
        }
    }
    Ok(())
}

/// Duplicate a node's left terminus for each extent in `sizes` (descending).
///
/// The node is divided at every extent boundary; the shortest extent keeps
/// the leading piece as its terminus, while each longer extent gets a fresh
/// copy of its full prefix wired into the piece chain where its span ends.
/// Returns `[remainder, terminus_0, terminus_1, ...]` with the termini in
/// `sizes` order.
pub fn duplicate_prefix(
    graph: &mut BidirectedGraph,
    sizes: &[usize],
    parent_handle: Handle,
) -> Vec<Handle> {
    let parent_length = graph.get_length(parent_handle);
    let sequence = graph.get_sequence(parent_handle).unwrap_or_default();

    let mut offsets: Vec<usize> = sizes
        .iter()
        .rev()
        .copied()
        .filter(|&s| s < parent_length)
        .collect();
    offsets.dedup();

    let pieces = if offsets.is_empty() {
        vec![parent_handle]
    } else {
        graph.divide_handle(parent_handle, &offsets)
    };

    // Start offset of each piece
    let mut piece_at: HashMap<usize, Handle> = HashMap::new();
    let mut cursor = 0;
    for &piece in &pieces {
        piece_at.insert(cursor, piece);
        cursor += graph.get_length(piece);
    }

    let remainder = *pieces.last().expect("divide always yields pieces");
    let mut children = vec![remainder];

    for (i, &size) in sizes.iter().enumerate() {
        if i + 1 == sizes.len() && size < parent_length {
            // The leading piece spells exactly the shortest extent
            children.push(pieces[0]);
            continue;
        }
        let copy = graph.create_handle(sequence[..size].to_vec());
        if size < parent_length {
            let continuation = piece_at[&size];
            graph.create_edge(copy, continuation);
        } else {
            // Full-length terminus: inherit the remainder's outer edges
            for neighbour in graph.edges_from(remainder) {
                graph.create_edge(copy, neighbour);
            }
        }
        children.push(copy);
    }
    children
}

/// Mirror of `duplicate_prefix` for the right side. Returns
/// `[remainder, terminus_0, ...]` where the remainder is the leading piece
/// that keeps the node's left side.
pub fn duplicate_suffix(
    graph: &mut BidirectedGraph,
    sizes: &[usize],
    parent_handle: Handle,
) -> Vec<Handle> {
    let parent_length = graph.get_length(parent_handle);
    let sequence = graph.get_sequence(parent_handle).unwrap_or_default();

    let mut offsets: Vec<usize> = sizes
        .iter()
        .copied()
        .filter(|&s| s < parent_length)
        .map(|s| parent_length - s)
        .collect();
    offsets.dedup();

    let pieces = if offsets.is_empty() {
        vec![parent_handle]
    } else {
        graph.divide_handle(parent_handle, &offsets)
    };

    // End offset of each piece
    let mut piece_ending_at: HashMap<usize, Handle> = HashMap::new();
    let mut cursor = 0;
    for &piece in &pieces {
        cursor += graph.get_length(piece);
        piece_ending_at.insert(cursor, piece);
    }

    let remainder = pieces[0];
    let mut children = vec![remainder];

    for (i, &size) in sizes.iter().enumerate() {
        if i + 1 == sizes.len() && size < parent_length {
            children.push(*pieces.last().expect("divide always yields pieces"));
            continue;
        }
        let copy = graph.create_handle(sequence[parent_length - size..].to_vec());
        if size < parent_length {
            let continuation = piece_ending_at[&(parent_length - size)];
            graph.create_edge(continuation, copy);
        } else {
            for neighbour in graph.edges_to(remainder) {
                graph.create_edge(neighbour, copy);
            }
        }
        children.push(copy);
    }
    children
}
