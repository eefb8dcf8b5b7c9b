use crate::bidirected_graph::{BiEdge, Handle};
use crate::bidirected_ops::BidirectedGraph;
use crate::duplicator::Duplicator;
use crate::error::{BluntifyError, Result};
use crate::node_info::{LEFT, RIGHT};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Which part of a cut POA path loses its content to the parent backbone
enum Prune {
    Head,
    Tail,
}

/// Splice the POA subpaths of overlapping-overlap children into the parent
/// at interior offsets.
///
/// The parent is divided at every child boundary. Pieces owned by exactly
/// one side's POA are retired; pieces in the shared region (and gaps no
/// overlap reaches) survive as the backbone. Each child's POA path is cut
/// where the backbone takes over, so shared content exists exactly once,
/// referenced from both flanking subgraphs.
pub fn splice_overlapping_overlaps(
    graph: &mut BidirectedGraph,
    duplicator: &Duplicator,
    to_be_destroyed: &mut HashSet<usize>,
) -> Result<()> {
    let mut oo_ids: Vec<usize> = duplicator
        .overlapping_overlap_nodes
        .keys()
        .copied()
        .collect();
    oo_ids.sort_unstable();

    for oo_id in oo_ids {
        let info = &duplicator.overlapping_overlap_nodes[&oo_id];
        let parent_length = info.length;
        let lefts = &info.overlapping_children[LEFT];
        let rights = &info.overlapping_children[RIGHT];

        let l_max = lefts.iter().map(|c| c.length).max().unwrap_or(0);
        let r_max = rights.iter().map(|c| c.length).max().unwrap_or(0);
        // The backbone owns [boundary_left, boundary_right)
        let boundary_left = parent_length - r_max;
        let boundary_right = l_max;

        let cuts: BTreeSet<usize> = lefts
            .iter()
            .map(|c| c.length)
            .chain(rights.iter().map(|c| parent_length - c.length))
            .filter(|&c| c > 0 && c < parent_length)
            .collect();
        let cut_offsets: Vec<usize> = cuts.iter().copied().collect();
        let pieces = graph.divide_handle(Handle::forward(oo_id), &cut_offsets);

        let mut piece_start: BTreeMap<usize, Handle> = BTreeMap::new();
        let mut piece_end: BTreeMap<usize, Handle> = BTreeMap::new();
        let mut cursor = 0;
        for &piece in &pieces {
            let length = graph.get_length(piece);
            piece_start.insert(cursor, piece);
            piece_end.insert(cursor + length, piece);

            let (a, b) = (cursor, cursor + length);
            cursor = b;

            let shared = a >= boundary_left && b <= boundary_right;
            if shared {
                continue;
            }
            if b <= boundary_right {
                // Left-side region: survives only as a continuation for a
                // shorter left child ending at or before it
                if !lefts.iter().any(|c| c.length <= a) {
                    to_be_destroyed.insert(piece.node_id());
                }
            } else if a >= boundary_left {
                // Right-side region: survives only to carry walks into a
                // right child starting at or after it
                if !rights.iter().any(|c| parent_length - c.length >= b) {
                    to_be_destroyed.insert(piece.node_id());
                }
            }
        }

        for child in lefts {
            let (path_name, forward_dir) = locate_child_path(graph, child.handle.node_id())?;
            let length = child.length;
            let q = length.min(boundary_left);
            debug!(
                "oo node {}: left child {} cut at {} ({})",
                oo_id, child.handle, q, path_name
            );

            if q == 0 {
                // The whole child lies inside the other side's span; keep
                // its path intact and hand over at its end if a piece exists
                if let Some(&piece) = piece_start.get(&length) {
                    let (first, last) = named_path_ends(graph, &path_name)?;
                    if forward_dir {
                        graph.create_edge(last, piece);
                    } else {
                        graph.create_edge(piece.flip(), first);
                    }
                }
                continue;
            }

            if q < length {
                let path_offset = if forward_dir { q } else { length - q };
                let (up, down) = sever_path(
                    graph,
                    &path_name,
                    path_offset,
                    if forward_dir { Prune::Tail } else { Prune::Head },
                    to_be_destroyed,
                )?;
                let piece = piece_start[&q];
                if forward_dir {
                    graph.create_edge(up, piece);
                } else {
                    graph.create_edge(piece.flip(), down);
                }
            } else if length < parent_length {
                let (first, last) = named_path_ends(graph, &path_name)?;
                let piece = piece_start[&length];
                if forward_dir {
                    graph.create_edge(last, piece);
                } else {
                    graph.create_edge(piece.flip(), first);
                }
            }
        }

        for child in rights {
            let (path_name, forward_dir) = locate_child_path(graph, child.handle.node_id())?;
            let length = child.length;
            let start = parent_length - length;
            let entry = start.max(boundary_right);
            debug!(
                "oo node {}: right child {} entered at {} ({})",
                oo_id, child.handle, entry, path_name
            );

            if entry >= parent_length {
                // Mirror degenerate case: the other side owns everything;
                // walks reach this child only through its biclique partners
                if let Some(&piece) = piece_end.get(&start) {
                    let (first, last) = named_path_ends(graph, &path_name)?;
                    if forward_dir {
                        graph.create_edge(piece, first);
                    } else {
                        graph.create_edge(last, piece.flip());
                    }
                }
                continue;
            }

            if entry > start {
                let path_offset = if forward_dir {
                    entry - start
                } else {
                    parent_length - entry
                };
                let (up, down) = sever_path(
                    graph,
                    &path_name,
                    path_offset,
                    if forward_dir { Prune::Head } else { Prune::Tail },
                    to_be_destroyed,
                )?;
                let piece = piece_end[&entry];
                if forward_dir {
                    graph.create_edge(piece, down);
                } else {
                    graph.create_edge(up, piece.flip());
                }
            } else if start > 0 {
                let (first, last) = named_path_ends(graph, &path_name)?;
                let piece = piece_end[&start];
                if forward_dir {
                    graph.create_edge(piece, first);
                } else {
                    graph.create_edge(last, piece.flip());
                }
            }
        }
    }
    Ok(())
}

fn named_path_ends(graph: &BidirectedGraph, name: &str) -> Result<(Handle, Handle)> {
    let path = graph.get_path(name).ok_or(BluntifyError::NotFound {
        edge: format!("path {}", name),
    })?;
    match (path.first_step(), path.last_step()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(BluntifyError::NotFound {
            edge: format!("path {} is empty", name),
        }),
    }
}

/// Find the POA path of a terminus child, trying both biclique sides, and
/// report whether the path spells the child forward or reverse-complement.
fn locate_child_path(graph: &BidirectedGraph, child_id: usize) -> Result<(String, bool)> {
    let child_sequence = graph
        .get_sequence(Handle::forward(child_id))
        .ok_or(BluntifyError::NotFound {
            edge: format!("child {}", child_id),
        })?;
    let reverse = crate::bidirected_graph::reverse_complement(&child_sequence);

    for side in [0, 1] {
        let name = format!("{}_{}", child_id, side);
        if let Some(path) = graph.get_path(&name) {
            let spelled = graph.path_sequence(path);
            if spelled == child_sequence {
                return Ok((name, true));
            }
            if spelled == reverse {
                return Ok((name, false));
            }
        }
    }
    Err(BluntifyError::NotFound {
        edge: format!("POA path for child {}", child_id),
    })
}

/// Make a step boundary at `path_offset` (dividing a POA node when the cut
/// lands mid-step), sever the chain edge across it, prune the orphaned side
/// of the cut, and return the steps on each side of the boundary.
fn sever_path(
    graph: &mut BidirectedGraph,
    path_name: &str,
    path_offset: usize,
    prune: Prune,
    to_be_destroyed: &mut HashSet<usize>,
) -> Result<(Handle, Handle)> {
    // First pass: find the step containing the offset, dividing if needed
    let steps = graph
        .get_path(path_name)
        .ok_or(BluntifyError::NotFound {
            edge: format!("path {}", path_name),
        })?
        .steps
        .clone();

    let mut cumulative = 0;
    for (i, &step) in steps.iter().enumerate() {
        let length = graph.get_length(step);
        if cumulative + length > path_offset {
            if cumulative < path_offset {
                // Mid-step: divide the POA node at the interior offset
                graph.divide_handle(step, &[path_offset - cumulative]);
                return sever_path(graph, path_name, path_offset, prune, to_be_destroyed);
            }
            if i == 0 {
                return Err(BluntifyError::NotFound {
                    edge: format!("cut at start of path {}", path_name),
                });
            }
            let up = steps[i - 1];
            let down = step;
            graph.destroy_edge(BiEdge::new(up, down));

            match prune {
                Prune::Tail => {
                    for &orphan in &steps[i..] {
                        if graph.edges_to(orphan).is_empty() {
                            to_be_destroyed.insert(orphan.node_id());
                            graph.isolate_handle(orphan);
                        } else {
                            break;
                        }
                    }
                }
                Prune::Head => {
                    for &orphan in steps[..i].iter().rev() {
                        if graph.edges_from(orphan).is_empty() {
                            to_be_destroyed.insert(orphan.node_id());
                            graph.isolate_handle(orphan);
                        } else {
                            break;
                        }
                    }
                }
            }
            return Ok((up, down));
        }
        cumulative += length;
    }
    Err(BluntifyError::NotFound {
        edge: format!("offset {} beyond path {}", path_offset, path_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicator::{ChildRecord, OverlappingChild, OverlappingOverlapNodeInfo};

    /// Node 1 = AAACG (length 5), left overlap AAA, right overlap ACG.
    /// The POA paths for both children already sit in the graph, as the
    /// splicer would leave them after C7.
    fn build_oo_fixture() -> (BidirectedGraph, Duplicator, HashSet<usize>) {
        let mut graph = BidirectedGraph::new();
        graph.add_node(1, b"AAACG".to_vec());
        graph.create_path("1".to_string(), vec![Handle::forward(1)]);

        // Terminus copies
        graph.add_node(10, b"AAA".to_vec());
        graph.add_node(11, b"ACG".to_vec());

        // POA for the left biclique merged the left child with a partner
        // suffix: single chain A-A-A, one step per node to exercise cutting
        graph.add_node(20, b"AA".to_vec());
        graph.add_node(21, b"A".to_vec());
        graph.create_edge(Handle::forward(20), Handle::forward(21));
        graph.create_path("10_1".to_string(), vec![Handle::forward(20), Handle::forward(21)]);

        // POA for the right biclique: chain AC-G
        graph.add_node(30, b"AC".to_vec());
        graph.add_node(31, b"G".to_vec());
        graph.create_edge(Handle::forward(30), Handle::forward(31));
        graph.create_path("11_0".to_string(), vec![Handle::forward(30), Handle::forward(31)]);

        let mut duplicator = Duplicator::new();
        duplicator.child_to_parent.insert(
            10,
            ChildRecord {
                parent: 1,
                side: LEFT,
                start: 0,
                stop: 3,
            },
        );
        duplicator.child_to_parent.insert(
            11,
            ChildRecord {
                parent: 1,
                side: RIGHT,
                start: 2,
                stop: 5,
            },
        );
        duplicator.overlapping_overlap_nodes.insert(
            1,
            OverlappingOverlapNodeInfo {
                parent_id: 1,
                length: 5,
                overlapping_children: [
                    vec![OverlappingChild {
                        biclique_index: 0,
                        handle: Handle::forward(10),
                        length: 3,
                    }],
                    vec![OverlappingChild {
                        biclique_index: 1,
                        handle: Handle::forward(11),
                        length: 3,
                    }],
                ],
            },
        );

        let mut to_be_destroyed = HashSet::new();
        to_be_destroyed.insert(10);
        to_be_destroyed.insert(11);
        (graph, duplicator, to_be_destroyed)
    }

    #[test]
    fn test_shared_middle_base_survives_once() {
        let (mut graph, duplicator, mut to_be_destroyed) = build_oo_fixture();
        splice_overlapping_overlaps(&mut graph, &duplicator, &mut to_be_destroyed).unwrap();

        // Parent divided at 2 and 3; the shared piece spells the middle base
        let path = graph.get_path("1").unwrap();
        assert_eq!(path.steps.len(), 3);
        let outer_left = path.steps[0];
        let shared = path.steps[1];
        let outer_right = path.steps[2];
        assert_eq!(graph.get_sequence(shared).unwrap(), b"A");

        // Side pieces are retired, their content lives in the POAs
        assert!(to_be_destroyed.contains(&outer_left.node_id()));
        assert!(to_be_destroyed.contains(&outer_right.node_id()));
        assert!(!to_be_destroyed.contains(&shared.node_id()));

        // Left POA keeps its first two bases and hands over to the shared
        // piece; the severed third base is pruned
        assert!(graph.has_edge(Handle::forward(20), shared));
        assert!(to_be_destroyed.contains(&21));
        assert!(graph.edges_to(Handle::forward(21)).is_empty());

        // Right POA is entered from the shared piece at interior offset 1;
        // the mid-step cut divided node 30
        let right_path = graph.get_path("11_0").unwrap();
        let entry = right_path.steps[1];
        assert!(graph.has_edge(shared, entry));
        assert_eq!(graph.get_sequence(entry).unwrap(), b"C");
    }

    #[test]
    fn test_two_hop_walk_spelled_through_backbone() {
        let (mut graph, duplicator, mut to_be_destroyed) = build_oo_fixture();
        splice_overlapping_overlaps(&mut graph, &duplicator, &mut to_be_destroyed).unwrap();

        // Walk: left POA head, shared piece, right POA tail spells the
        // parent sequence
        let shared = graph.get_path("1").unwrap().steps[1];
        let mut spelled = Vec::new();
        spelled.extend(graph.get_sequence(Handle::forward(20)).unwrap());
        spelled.extend(graph.get_sequence(shared).unwrap());
        let right_path = graph.get_path("11_0").unwrap();
        for &step in &right_path.steps[1..] {
            spelled.extend(graph.get_sequence(step).unwrap());
        }
        assert_eq!(spelled, b"AAACG");
    }

    fn oo_record(
        duplicator: &mut Duplicator,
        parent: usize,
        length: usize,
        left: (usize, usize),
        right: (usize, usize),
    ) {
        let (left_id, left_len) = left;
        let (right_id, right_len) = right;
        duplicator.child_to_parent.insert(
            left_id,
            ChildRecord {
                parent,
                side: LEFT,
                start: 0,
                stop: left_len,
            },
        );
        duplicator.child_to_parent.insert(
            right_id,
            ChildRecord {
                parent,
                side: RIGHT,
                start: length - right_len,
                stop: length,
            },
        );
        duplicator.overlapping_overlap_nodes.insert(
            parent,
            OverlappingOverlapNodeInfo {
                parent_id: parent,
                length,
                overlapping_children: [
                    vec![OverlappingChild {
                        biclique_index: 0,
                        handle: Handle::forward(left_id),
                        length: left_len,
                    }],
                    vec![OverlappingChild {
                        biclique_index: 1,
                        handle: Handle::forward(right_id),
                        length: right_len,
                    }],
                ],
            },
        );
    }

    /// Node 1 = ACGT with a right overlap spanning the whole node and a
    /// left overlap of 2: the left child's span lies entirely inside the
    /// right side's, and the right entry cut lands mid-step in a 3-base
    /// POA node.
    #[test]
    fn test_left_child_contained_in_right_span() {
        let mut graph = BidirectedGraph::new();
        graph.add_node(1, b"ACGT".to_vec());
        graph.create_path("1".to_string(), vec![Handle::forward(1)]);

        // Terminus copies
        graph.add_node(10, b"AC".to_vec());
        graph.add_node(11, b"ACGT".to_vec());

        // Left POA: single node
        graph.add_node(20, b"AC".to_vec());
        graph.create_path("10_1".to_string(), vec![Handle::forward(20)]);

        // Right POA: the handoff offset falls inside the leading node
        graph.add_node(30, b"ACG".to_vec());
        graph.add_node(31, b"T".to_vec());
        graph.create_edge(Handle::forward(30), Handle::forward(31));
        graph.create_path("11_0".to_string(), vec![Handle::forward(30), Handle::forward(31)]);

        let mut duplicator = Duplicator::new();
        oo_record(&mut duplicator, 1, 4, (10, 2), (11, 4));

        let mut to_be_destroyed: HashSet<usize> = [10, 11].into_iter().collect();
        splice_overlapping_overlaps(&mut graph, &duplicator, &mut to_be_destroyed).unwrap();

        // The parent splits at the left child's boundary; the leading piece
        // is shared, the tail is owned by the right POA
        let path = graph.get_path("1").unwrap();
        assert_eq!(path.steps.len(), 2);
        let head = path.steps[0];
        let tail = path.steps[1];
        assert_eq!(graph.get_sequence(head).unwrap(), b"AC");
        assert!(!to_be_destroyed.contains(&head.node_id()));
        assert!(to_be_destroyed.contains(&tail.node_id()));

        // The wholly-contained left child keeps its path and hands over at
        // its end
        assert!(graph.has_edge(Handle::forward(20), tail));

        // The mid-step cut divided the 3-base POA node: its leading piece
        // is pruned and the backbone enters at the remainder
        let right_path = graph.get_path("11_0").unwrap();
        assert_eq!(right_path.steps.len(), 3);
        let pruned = right_path.steps[0];
        let entry = right_path.steps[1];
        assert!(to_be_destroyed.contains(&pruned.node_id()));
        assert!(graph.edges_to(pruned).is_empty());
        assert_eq!(graph.get_sequence(entry).unwrap(), b"G");
        assert!(graph.has_edge(head, entry));

        // Backbone walk spells the parent
        let mut spelled = graph.get_sequence(head).unwrap();
        for &step in &right_path.steps[1..] {
            spelled.extend(graph.get_sequence(step).unwrap());
        }
        assert_eq!(spelled, b"ACGT");
    }

    /// Mirror case: the left overlap spans the whole node, so the right
    /// child's entry offset reaches the node end and its path is reachable
    /// only through its biclique partners.
    #[test]
    fn test_right_child_contained_in_left_span() {
        let mut graph = BidirectedGraph::new();
        graph.add_node(1, b"ACGT".to_vec());
        graph.create_path("1".to_string(), vec![Handle::forward(1)]);

        graph.add_node(12, b"ACGT".to_vec());
        graph.add_node(13, b"GT".to_vec());

        // Left POA: two steps so the cut severs at a step boundary
        graph.add_node(40, b"AC".to_vec());
        graph.add_node(41, b"GT".to_vec());
        graph.create_edge(Handle::forward(40), Handle::forward(41));
        graph.create_path("12_1".to_string(), vec![Handle::forward(40), Handle::forward(41)]);

        // Right POA: single node
        graph.add_node(50, b"GT".to_vec());
        graph.create_path("13_0".to_string(), vec![Handle::forward(50)]);

        let mut duplicator = Duplicator::new();
        oo_record(&mut duplicator, 1, 4, (12, 4), (13, 2));

        let mut to_be_destroyed: HashSet<usize> = [12, 13].into_iter().collect();
        splice_overlapping_overlaps(&mut graph, &duplicator, &mut to_be_destroyed).unwrap();

        // The leading piece belongs to the left POA, the tail is shared
        let path = graph.get_path("1").unwrap();
        assert_eq!(path.steps.len(), 2);
        let head = path.steps[0];
        let tail = path.steps[1];
        assert!(to_be_destroyed.contains(&head.node_id()));
        assert!(!to_be_destroyed.contains(&tail.node_id()));
        assert_eq!(graph.get_sequence(tail).unwrap(), b"GT");

        // Left path cut at the shared boundary: the severed tail step is
        // pruned and the kept head hands over to the shared piece
        assert!(graph.has_edge(Handle::forward(40), tail));
        assert!(to_be_destroyed.contains(&41));
        assert!(graph.edges_to(Handle::forward(41)).is_empty());

        // The fully-contained right child is only fed from the retired
        // piece ahead of it; its own content stays with its partners
        assert!(graph.has_edge(head, Handle::forward(50)));

        // Kept walk spells the parent
        let mut spelled = graph.get_sequence(Handle::forward(40)).unwrap();
        spelled.extend(graph.get_sequence(tail).unwrap());
        assert_eq!(spelled, b"ACGT");
    }
}
