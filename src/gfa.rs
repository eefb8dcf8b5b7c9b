use crate::bidirected_graph::{BiEdge, Handle};
use crate::bidirected_ops::BidirectedGraph;
use crate::cigar::Cigar;
use crate::error::{BluntifyError, Result};
use crate::overlap_map::OverlapMap;
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// Bijection between segment names and dense integer ids starting at 1
#[derive(Default, Clone)]
pub struct IncrementalIdMap {
    pub names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl IncrementalIdMap {
    pub fn new() -> Self {
        IncrementalIdMap {
            names: Vec::new(),
            ids: HashMap::new(),
        }
    }

    pub fn get_or_insert(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        self.names.push(name.to_string());
        let id = self.names.len();
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn get_id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn get_name(&self, id: usize) -> Option<&str> {
        self.names.get(id - 1).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_orientation(field: &str, line: usize) -> Result<bool> {
    match field {
        "+" => Ok(false),
        "-" => Ok(true),
        other => Err(BluntifyError::MalformedInput {
            line,
            reason: format!("expected '+' or '-', got '{}'", other),
        }),
    }
}

/// Read a GFA file into a bidirected graph, an id map and an overlap map.
///
/// `H` lines are ignored beyond their presence, `S` lines become nodes and
/// `L` lines become edges whose CIGARs are recorded in the overlap map under
/// the edge as written. Any other record type is skipped.
pub fn read_gfa<R: BufRead>(
    reader: R,
) -> Result<(BidirectedGraph, IncrementalIdMap, OverlapMap)> {
    let mut graph = BidirectedGraph::new();
    let mut id_map = IncrementalIdMap::new();
    let mut overlaps = OverlapMap::new();

    for (line_index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = line_index + 1;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        match fields[0] {
            "S" => {
                if fields.len() < 3 {
                    return Err(BluntifyError::MalformedInput {
                        line: line_number,
                        reason: "S line needs a name and a sequence".to_string(),
                    });
                }
                let id = id_map.get_or_insert(fields[1]);
                if fields[2] == "*" {
                    return Err(BluntifyError::MalformedInput {
                        line: line_number,
                        reason: format!("segment '{}' has no sequence", fields[1]),
                    });
                }
                graph.add_node(id, fields[2].as_bytes().to_vec());
            }
            "L" => {
                if fields.len() < 6 {
                    return Err(BluntifyError::MalformedInput {
                        line: line_number,
                        reason: "L line needs source, sink, orientations and a CIGAR".to_string(),
                    });
                }
                let from_id = id_map.get_or_insert(fields[1]);
                let from_reverse = parse_orientation(fields[2], line_number)?;
                let to_id = id_map.get_or_insert(fields[3]);
                let to_reverse = parse_orientation(fields[4], line_number)?;

                let cigar = Cigar::from_str(fields[5]).map_err(|e| match e {
                    BluntifyError::MalformedInput { reason, .. } => {
                        BluntifyError::MalformedInput {
                            line: line_number,
                            reason,
                        }
                    }
                    other => other,
                })?;

                let edge = BiEdge::new(
                    Handle::new(from_id, from_reverse),
                    Handle::new(to_id, to_reverse),
                );
                graph.create_edge(edge.from, edge.to);
                if overlaps.canonicalize_and_find(edge).is_err() {
                    overlaps.insert(edge, cigar);
                }
            }
            "H" => {}
            _ => {}
        }
    }

    // Every link must reference a declared segment
    for edge in &graph.edges {
        for id in [edge.from.node_id(), edge.to.node_id()] {
            if !graph.has_node(id) {
                return Err(BluntifyError::MalformedInput {
                    line: 0,
                    reason: format!(
                        "link references segment '{}' with no S line",
                        id_map.get_name(id).unwrap_or("?")
                    ),
                });
            }
        }
    }

    Ok((graph, id_map, overlaps))
}

/// Emit the graph as blunt GFA: an `H` line, `S` lines for every surviving
/// node and `L` lines with `0M` overlaps. Paths are bookkeeping and are not
/// written.
pub fn write_gfa<W: Write>(graph: &BidirectedGraph, writer: &mut W) -> Result<()> {
    writeln!(writer, "H\tVN:Z:1.0")?;

    let mut node_ids: Vec<usize> = graph.nodes.keys().copied().collect();
    node_ids.sort_unstable();
    for node_id in node_ids {
        let node = &graph.nodes[&node_id];
        writeln!(
            writer,
            "S\t{}\t{}",
            node_id,
            String::from_utf8_lossy(&node.sequence)
        )?;
    }

    let mut edges: Vec<BiEdge> = graph.edges.iter().copied().collect();
    edges.sort_unstable();
    for edge in edges {
        writeln!(
            writer,
            "L\t{}\t{}\t{}\t{}\t0M",
            edge.from.node_id(),
            edge.from.orientation_char(),
            edge.to.node_id(),
            edge.to.orientation_char()
        )?;
    }
    Ok(())
}
