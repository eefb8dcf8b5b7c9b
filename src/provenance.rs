use crate::bidirected_ops::BidirectedGraph;
use crate::duplicator::Duplicator;
use crate::error::{BluntifyError, Result};
use crate::node_info::{BicliqueEdgeIndex, Bicliques, NodeInfo, LEFT, RIGHT};
use crate::overlap_map::OverlapMap;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

/// One interval of one input node that an output node was derived from.
/// `start..=stop` is closed; `reversal` means the output node spells the
/// reverse complement of the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvenanceInfo {
    pub start: usize,
    pub stop: usize,
    pub reversal: bool,
}

/// output node id -> input node id -> intervals
pub type ProvenanceMap = BTreeMap<usize, BTreeMap<usize, Vec<ProvenanceInfo>>>;

fn record(
    map: &mut ProvenanceMap,
    node_id: usize,
    parent_id: usize,
    info: ProvenanceInfo,
) {
    let entries = map.entry(node_id).or_default().entry(parent_id).or_default();
    if !entries.contains(&info) {
        entries.push(info);
    }
}

/// Determine, for every surviving output node, the input interval(s) it
/// came from.
///
/// Surviving steps of each parent path are recorded directly with forward
/// intervals. Each biclique incident on the parent is then resolved through
/// its longest participating overlap: the corresponding POA path is walked
/// from the terminus child's recorded interval, ascending for forward
/// termini and descending with the reversal flag set for reversed ones.
pub fn compute_provenance(
    graph: &BidirectedGraph,
    bicliques: &Bicliques,
    overlaps: &OverlapMap,
    node_to_biclique_edge: &[Vec<BicliqueEdgeIndex>],
    duplicator: &Duplicator,
    to_be_destroyed: &HashSet<usize>,
    input_node_count: usize,
) -> Result<ProvenanceMap> {
    let mut map = ProvenanceMap::new();

    for parent_id in 1..=input_node_count {
        // Pass 1: the parent path's surviving pieces
        match graph.get_path(&parent_id.to_string()) {
            Some(path) => {
                let mut offset = 0;
                for &step in &path.steps {
                    let length = graph.get_length(step);
                    if length == 0 {
                        continue;
                    }
                    if !to_be_destroyed.contains(&step.node_id()) {
                        record(
                            &mut map,
                            step.node_id(),
                            parent_id,
                            ProvenanceInfo {
                                start: offset,
                                stop: offset + length - 1,
                                reversal: step.is_reverse(),
                            },
                        );
                    }
                    offset += length;
                }
            }
            None => {
                // Untouched by every biclique: the node passes through whole
                if graph.has_node(parent_id) && !to_be_destroyed.contains(&parent_id) {
                    let length = graph.get_length(crate::bidirected_graph::Handle::forward(parent_id));
                    if length > 0 {
                        record(
                            &mut map,
                            parent_id,
                            parent_id,
                            ProvenanceInfo {
                                start: 0,
                                stop: length - 1,
                                reversal: false,
                            },
                        );
                    }
                }
                continue;
            }
        }

        // Pass 2: POA paths of the bicliques incident on this parent.
        // The graph has been rewired, so factoring resolves child ids back
        // to their parents.
        let node_info = NodeInfo::with_parent_lookup(
            node_to_biclique_edge,
            bicliques,
            overlaps,
            parent_id,
            |id| duplicator.resolve_parent(id),
        )?;

        let mut walked: HashSet<(usize, usize)> = HashSet::new();
        for side in [LEFT, RIGHT] {
            for (&biclique_index, infos) in &node_info.factored_overlaps[side] {
                // The longest overlap represents the biclique on this side
                let representative = infos[0];
                let edge = bicliques.bicliques[biclique_index][representative.edge_index];

                for (biclique_side, handle) in [(0usize, edge.from), (1usize, edge.to)] {
                    let child_id = handle.node_id();
                    let Some(child) = duplicator.child_to_parent.get(&child_id) else {
                        continue;
                    };
                    if child.parent != parent_id {
                        continue;
                    }
                    if !walked.insert((child_id, biclique_side)) {
                        continue;
                    }

                    let path_name = format!("{}_{}", child_id, biclique_side);
                    let path = graph.get_path(&path_name).ok_or(BluntifyError::NotFound {
                        edge: format!("POA path {}", path_name),
                    })?;

                    if !handle.is_reverse() {
                        let mut position = child.start;
                        for &step in &path.steps {
                            let length = graph.get_length(step);
                            if length == 0 {
                                continue;
                            }
                            if !to_be_destroyed.contains(&step.node_id()) {
                                record(
                                    &mut map,
                                    step.node_id(),
                                    parent_id,
                                    ProvenanceInfo {
                                        start: position,
                                        stop: position + length - 1,
                                        reversal: step.is_reverse(),
                                    },
                                );
                            }
                            position += length;
                        }
                    } else {
                        // The path spells the reverse complement of the
                        // child's interval: indices descend from its stop
                        let mut position = child.stop;
                        for &step in &path.steps {
                            let length = graph.get_length(step);
                            if length == 0 {
                                continue;
                            }
                            if !to_be_destroyed.contains(&step.node_id()) {
                                record(
                                    &mut map,
                                    step.node_id(),
                                    parent_id,
                                    ProvenanceInfo {
                                        start: position - length,
                                        stop: position - 1,
                                        reversal: !step.is_reverse(),
                                    },
                                );
                            }
                            position -= length;
                        }
                    }
                }
            }
        }
    }

    Ok(map)
}

/// One line per output node: `<node>\t<parent>[<start>:<stop>]<sign>` with
/// a comma-separated record per originating interval. `stop` is written
/// exclusive.
pub fn write_provenance<W: Write>(map: &ProvenanceMap, writer: &mut W) -> Result<()> {
    for (node_id, parents) in map {
        let mut entries = Vec::new();
        for (parent_id, infos) in parents {
            for info in infos {
                entries.push(format!(
                    "{}[{}:{}]{}",
                    parent_id,
                    info.start,
                    info.stop + 1,
                    if info.reversal { '-' } else { '+' }
                ));
            }
        }
        writeln!(writer, "{}\t{}", node_id, entries.join(","))?;
    }
    Ok(())
}
