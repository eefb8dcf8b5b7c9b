use crate::bidirected_graph::Handle;
use crate::bidirected_ops::BidirectedGraph;
use crate::duplicator::Duplicator;
use crate::error::{BluntifyError, Result};
use crate::node_info::Bicliques;
use log::debug;
use spoa_rs::{AlignmentEngine, AlignmentType as SpoaAlignmentType, Graph as SpoaGraph};
use std::collections::{HashMap, HashSet};

/// One terminus's labelled path through a biclique's POA subgraph
#[derive(Debug, Clone)]
pub struct PathInfo {
    pub path_name: String,
    pub biclique_side: usize,
}

/// The aligned replacement structure for one biclique, before splicing
#[derive(Debug, Default, Clone)]
pub struct Subgraph {
    pub graph: BidirectedGraph,
    pub paths_per_handle: [HashMap<Handle, PathInfo>; 2],
}

/// Rewrite each biclique's edges so every node reads in one consistent
/// orientation within the biclique. The first edge seats the reference;
/// later edges are complemented when that reconciles more endpoints than it
/// breaks. A node genuinely used in both orientations keeps one flip.
pub fn harmonize_biclique_orientations(bicliques: &mut Bicliques) {
    for biclique in &mut bicliques.bicliques {
        let mut orientation: HashMap<usize, Handle> = HashMap::new();
        for edge in biclique.iter_mut() {
            let score = |e: &crate::bidirected_graph::BiEdge,
                         orientation: &HashMap<usize, Handle>| {
                let mut total = 0i32;
                for h in [e.from, e.to] {
                    if let Some(&known) = orientation.get(&h.node_id()) {
                        total += if known == h { 1 } else { -1 };
                    }
                }
                total
            };
            let flipped = edge.complement();
            if score(&flipped, &orientation) > score(edge, &orientation) {
                debug!("harmonizing {} to {}", edge, flipped);
                *edge = flipped;
            }
            orientation.entry(edge.from.node_id()).or_insert(edge.from);
            orientation.entry(edge.to.node_id()).or_insert(edge.to);
        }
    }
}

/// Align the end-segments of one biclique with partial order alignment and
/// return the resulting subgraph, one labelled path per terminus. Path
/// names encode the terminus node and its biclique side.
pub fn align_biclique_overlaps(
    graph: &BidirectedGraph,
    bicliques: &Bicliques,
    index: usize,
) -> Result<Subgraph> {
    let biclique = bicliques.get(index);
    let mut subgraph = Subgraph::default();

    // Distinct termini per side, in edge order
    let mut inputs: Vec<(String, Vec<u8>, Handle, usize)> = Vec::new();
    let mut seen: HashSet<(Handle, usize)> = HashSet::new();
    for edge in biclique {
        for (side, handle) in [(0usize, edge.from), (1usize, edge.to)] {
            if !seen.insert((handle, side)) {
                continue;
            }
            let sequence = graph
                .get_sequence(handle)
                .ok_or(BluntifyError::NotFound {
                    edge: edge.to_string(),
                })?;
            if sequence.is_empty() {
                continue;
            }
            let name = format!("{}_{}", handle.node_id(), side);
            inputs.push((name, sequence, handle, side));
        }
    }
    if inputs.is_empty() {
        return Ok(subgraph);
    }

    // Longest first gives spoa its best backbone
    inputs.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));

    subgraph.graph = run_spoa(&inputs)?;
    for (name, _, handle, side) in inputs {
        subgraph.paths_per_handle[side].insert(
            handle,
            PathInfo {
                path_name: name,
                biclique_side: side,
            },
        );
    }
    Ok(subgraph)
}

/// Global partial order alignment over the terminus sequences (spoa with
/// convex gaps), recovered by parsing the GFA text spoa emits.
fn run_spoa(inputs: &[(String, Vec<u8>, Handle, usize)]) -> Result<BidirectedGraph> {
    let mut spoa_graph = SpoaGraph::new();
    let mut engine = AlignmentEngine::new_convex(SpoaAlignmentType::kNW, 5, -4, -8, -6, -10, -2);

    for (_, sequence, _, _) in inputs {
        let text = String::from_utf8_lossy(sequence).to_string();
        let weights = vec![1u32; text.len()];
        let (_, alignment) = engine.align(&text, &spoa_graph);
        spoa_graph.add_alignment_with_weights(alignment, &text, &weights);
    }

    let headers: Vec<String> = inputs.iter().map(|(name, _, _, _)| name.clone()).collect();
    let gfa = spoa_graph.generate_gfa(&headers, false);
    parse_poa_gfa(&gfa)
}

/// Parse the GFA emitted by the POA aligner into a bidirected graph with
/// its labelled paths.
pub fn parse_poa_gfa(text: &str) -> Result<BidirectedGraph> {
    let mut graph = BidirectedGraph::new();
    for (line_index, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.first() {
            Some(&"S") if fields.len() >= 3 => {
                let id: usize = fields[1].parse().map_err(|_| BluntifyError::MalformedInput {
                    line: line_index + 1,
                    reason: format!("POA segment id '{}'", fields[1]),
                })?;
                graph.add_node(id, fields[2].as_bytes().to_vec());
            }
            Some(&"L") if fields.len() >= 5 => {
                let from: usize = fields[1].parse().map_err(|_| BluntifyError::MalformedInput {
                    line: line_index + 1,
                    reason: format!("POA link id '{}'", fields[1]),
                })?;
                let to: usize = fields[3].parse().map_err(|_| BluntifyError::MalformedInput {
                    line: line_index + 1,
                    reason: format!("POA link id '{}'", fields[3]),
                })?;
                graph.create_edge(
                    Handle::new(from, fields[2] == "-"),
                    Handle::new(to, fields[4] == "-"),
                );
            }
            Some(&"P") if fields.len() >= 3 => {
                let mut steps = Vec::new();
                for step in fields[2].split(',') {
                    let (id_text, reverse) = if let Some(t) = step.strip_suffix('+') {
                        (t, false)
                    } else if let Some(t) = step.strip_suffix('-') {
                        (t, true)
                    } else {
                        return Err(BluntifyError::MalformedInput {
                            line: line_index + 1,
                            reason: format!("POA path step '{}' has no orientation", step),
                        });
                    };
                    let id: usize =
                        id_text.parse().map_err(|_| BluntifyError::MalformedInput {
                            line: line_index + 1,
                            reason: format!("POA path step '{}'", step),
                        })?;
                    steps.push(Handle::new(id, reverse));
                }
                graph.create_path(fields[1].to_string(), steps);
            }
            _ => {}
        }
    }
    Ok(graph)
}

/// Find the first/last step of a named path
fn path_ends(graph: &BidirectedGraph, name: &str) -> Result<(Handle, Handle)> {
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

/// A neighbour that is itself a retired terminus stands in for its POA
/// path: approaching its left end resolves to the path's first step,
/// approaching its right end to the last.
fn resolve_left_end(
    graph: &BidirectedGraph,
    handle: Handle,
    retired: &HashMap<Handle, String>,
    to_be_destroyed: &HashSet<usize>,
) -> Result<Handle> {
    if !to_be_destroyed.contains(&handle.node_id()) {
        return Ok(handle);
    }
    if let Some(name) = retired.get(&handle) {
        let (first, _) = path_ends(graph, name)?;
        return Ok(first);
    }
    if let Some(name) = retired.get(&handle.flip()) {
        let (_, last) = path_ends(graph, name)?;
        return Ok(last.flip());
    }
    Ok(handle)
}

fn resolve_right_end(
    graph: &BidirectedGraph,
    handle: Handle,
    retired: &HashMap<Handle, String>,
    to_be_destroyed: &HashSet<usize>,
) -> Result<Handle> {
    if !to_be_destroyed.contains(&handle.node_id()) {
        return Ok(handle);
    }
    if let Some(name) = retired.get(&handle) {
        let (_, last) = path_ends(graph, name)?;
        return Ok(last);
    }
    if let Some(name) = retired.get(&handle.flip()) {
        let (first, _) = path_ends(graph, name)?;
        return Ok(first.flip());
    }
    Ok(handle)
}

/// Copy every biclique subgraph into the main graph and reconnect the POA
/// paths where the termini sat. Termini that served their only biclique are
/// scheduled for destruction (deferred until provenance has run).
pub fn splice_subgraphs(
    graph: &mut BidirectedGraph,
    subgraphs: &[Subgraph],
    duplicator: &Duplicator,
    to_be_destroyed: &mut HashSet<usize>,
) -> Result<()> {
    debug!("splicing {} subgraphs", subgraphs.len());

    // Copy everything in first so path proxies resolve across bicliques
    for subgraph in subgraphs {
        if subgraph.graph.nodes.is_empty() {
            continue;
        }
        let mut copy = subgraph.graph.clone();
        copy.increment_node_ids(graph.max_node_id() + 1);
        graph.copy_from(&copy);
    }

    // Schedule terminus retirement: a terminus survives only while the same
    // subgraph also uses it (or its flip) on the opposite side
    let mut retired: HashMap<Handle, String> = HashMap::new();
    for subgraph in subgraphs {
        for side in [0, 1] {
            for (handle, info) in &subgraph.paths_per_handle[side] {
                let other = &subgraph.paths_per_handle[1 - side];
                if !other.contains_key(handle) && !other.contains_key(&handle.flip()) {
                    to_be_destroyed.insert(handle.node_id());
                }
                retired.insert(*handle, info.path_name.clone());
            }
        }
    }

    for subgraph in subgraphs {
        if subgraph.graph.nodes.is_empty() {
            continue;
        }
        for side in [0, 1] {
            for (handle, info) in &subgraph.paths_per_handle[side] {
                let node_id = handle.node_id();
                if duplicator.is_oo_child(node_id) {
                    debug!("skipping overlapping-overlap child {}", node_id);
                    continue;
                }

                let (first, last) = path_ends(graph, &info.path_name)?;

                // The terminus body sits left of a suffix terminus, right of
                // a prefix terminus
                let go_left = side == 0;
                let parents = graph.follow_edges(*handle, go_left);
                if parents.is_empty()
                    && !duplicator.is_oo_parent(node_id)
                    && !duplicator.is_oo_child(node_id)
                {
                    return Err(BluntifyError::DanglingTerminus(node_id));
                }

                for parent in parents {
                    if side == 0 {
                        let target = resolve_right_end(graph, parent, &retired, to_be_destroyed)?;
                        graph.create_edge(target, first);
                    } else {
                        let target = resolve_left_end(graph, parent, &retired, to_be_destroyed)?;
                        graph.create_edge(last, target);
                    }
                }

                // Blunt pass-through edges on the outer side follow the
                // terminus onto the path's outer end
                let outers = graph.follow_edges(*handle, !go_left);
                for outer in outers {
                    if side == 0 {
                        let target = resolve_left_end(graph, outer, &retired, to_be_destroyed)?;
                        graph.create_edge(last, target);
                    } else {
                        let target = resolve_right_end(graph, outer, &retired, to_be_destroyed)?;
                        graph.create_edge(target, first);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidirected_graph::BiEdge;

    #[test]
    fn test_harmonize_reconciles_flipped_edge() {
        // Second edge stored in the complement orientation of the first
        let e1 = BiEdge::new(Handle::forward(1), Handle::forward(2));
        let e2 = BiEdge::new(Handle::reverse(2), Handle::reverse(3));
        let mut bicliques = Bicliques {
            bicliques: vec![vec![e1, e2]],
        };
        harmonize_biclique_orientations(&mut bicliques);

        let harmonized = &bicliques.bicliques[0];
        assert_eq!(harmonized[0], e1);
        // e2 complemented so node 2 reads forward on the sink side again
        assert_eq!(
            harmonized[1],
            BiEdge::new(Handle::forward(3), Handle::forward(2))
        );
    }

    #[test]
    fn test_harmonize_keeps_consistent_edges() {
        let e1 = BiEdge::new(Handle::forward(1), Handle::forward(2));
        let e2 = BiEdge::new(Handle::forward(1), Handle::forward(3));
        let mut bicliques = Bicliques {
            bicliques: vec![vec![e1, e2]],
        };
        harmonize_biclique_orientations(&mut bicliques);
        assert_eq!(bicliques.bicliques[0], vec![e1, e2]);
    }

    #[test]
    fn test_parse_poa_gfa() {
        let text = "H\tVN:Z:1.0\nS\t1\tGT\nS\t2\tAA\nL\t1\t+\t2\t+\t0M\nP\t5_0\t1+,2+\t*\n";
        let graph = parse_poa_gfa(text).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(graph.has_edge(Handle::forward(1), Handle::forward(2)));
        let path = graph.get_path("5_0").unwrap();
        assert_eq!(path.steps, vec![Handle::forward(1), Handle::forward(2)]);
    }

    /// Hand-built splice: termini 10 (suffix of a chain) and 11 (prefix of
    /// another chain) replaced by a single POA node
    #[test]
    fn test_splice_reconnects_paths() {
        let mut graph = BidirectedGraph::new();
        // Body pieces
        graph.add_node(1, b"AC".to_vec());
        graph.add_node(2, b"AA".to_vec());
        // Termini
        graph.add_node(10, b"GT".to_vec());
        graph.add_node(11, b"GT".to_vec());
        graph.create_edge(Handle::forward(1), Handle::forward(10));
        graph.create_edge(Handle::forward(11), Handle::forward(2));

        // POA merged both termini into one node with two identical paths
        let mut poa = BidirectedGraph::new();
        poa.add_node(1, b"GT".to_vec());
        poa.create_path("10_0".to_string(), vec![Handle::forward(1)]);
        poa.create_path("11_1".to_string(), vec![Handle::forward(1)]);

        let mut subgraph = Subgraph {
            graph: poa,
            paths_per_handle: [HashMap::new(), HashMap::new()],
        };
        subgraph.paths_per_handle[0].insert(
            Handle::forward(10),
            PathInfo {
                path_name: "10_0".to_string(),
                biclique_side: 0,
            },
        );
        subgraph.paths_per_handle[1].insert(
            Handle::forward(11),
            PathInfo {
                path_name: "11_1".to_string(),
                biclique_side: 1,
            },
        );

        let duplicator = Duplicator::new();
        let mut to_be_destroyed = HashSet::new();
        splice_subgraphs(&mut graph, &[subgraph], &duplicator, &mut to_be_destroyed).unwrap();

        // Both termini are retired
        assert!(to_be_destroyed.contains(&10));
        assert!(to_be_destroyed.contains(&11));

        // The copied POA node got a fresh id above the existing ones
        let poa_node = graph.get_path("10_0").unwrap().steps[0];
        assert!(poa_node.node_id() > 11);
        assert_eq!(graph.get_sequence(poa_node).unwrap(), b"GT");

        // Reconnected around the retired termini
        assert!(graph.has_edge(Handle::forward(1), poa_node));
        assert!(graph.has_edge(poa_node, Handle::forward(2)));
    }

    #[test]
    fn test_splice_dangling_terminus_is_fatal() {
        let mut graph = BidirectedGraph::new();
        graph.add_node(2, b"AA".to_vec());
        graph.add_node(10, b"GT".to_vec());
        graph.add_node(11, b"GT".to_vec());
        // Terminus 10 has no body on its left
        graph.create_edge(Handle::forward(11), Handle::forward(2));

        let mut poa = BidirectedGraph::new();
        poa.add_node(1, b"GT".to_vec());
        poa.create_path("10_0".to_string(), vec![Handle::forward(1)]);
        poa.create_path("11_1".to_string(), vec![Handle::forward(1)]);

        let mut subgraph = Subgraph {
            graph: poa,
            paths_per_handle: [HashMap::new(), HashMap::new()],
        };
        subgraph.paths_per_handle[0].insert(
            Handle::forward(10),
            PathInfo {
                path_name: "10_0".to_string(),
                biclique_side: 0,
            },
        );
        subgraph.paths_per_handle[1].insert(
            Handle::forward(11),
            PathInfo {
                path_name: "11_1".to_string(),
                biclique_side: 1,
            },
        );

        let duplicator = Duplicator::new();
        let mut to_be_destroyed = HashSet::new();
        let result = splice_subgraphs(&mut graph, &[subgraph], &duplicator, &mut to_be_destroyed);
        assert!(matches!(result, Err(BluntifyError::DanglingTerminus(10))));
    }
}
