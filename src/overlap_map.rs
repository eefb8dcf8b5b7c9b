use crate::bidirected_graph::BiEdge;
use crate::cigar::Cigar;
use crate::error::{BluntifyError, Result};
use std::collections::HashMap;

/// Lookup of overlap CIGARs by oriented edge.
///
/// An edge `(u, v)` and its complement `(flip(v), flip(u))` denote the same
/// physical overlap; exactly one of the two forms is stored, and lookups
/// accept either. The stored form is the canonical one.
#[derive(Default, Clone)]
pub struct OverlapMap {
    overlaps: HashMap<BiEdge, Cigar>,
}

impl OverlapMap {
    pub fn new() -> Self {
        OverlapMap {
            overlaps: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.overlaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlaps.is_empty()
    }

    /// Store an overlap under the edge as given
    pub fn insert(&mut self, edge: BiEdge, cigar: Cigar) {
        self.overlaps.insert(edge, cigar);
    }

    /// Exact-form lookup, no canonicalisation
    pub fn at(&self, edge: &BiEdge) -> Option<&Cigar> {
        self.overlaps.get(edge)
    }

    /// Find the stored form of an edge, trying the complement when the
    /// given orientation misses. Returns the stored edge and its CIGAR.
    pub fn canonicalize_and_find(&self, edge: BiEdge) -> Result<(BiEdge, &Cigar)> {
        if let Some(cigar) = self.overlaps.get(&edge) {
            return Ok((edge, cigar));
        }
        let complement = edge.complement();
        if let Some(cigar) = self.overlaps.get(&complement) {
            return Ok((complement, cigar));
        }
        Err(BluntifyError::NotFound {
            edge: edge.to_string(),
        })
    }

    /// Canonicalise and report how many bases the overlap consumes on the
    /// stored edge's (source, sink) sides.
    pub fn canonicalize_and_compute_lengths(&self, edge: BiEdge) -> Result<(BiEdge, (usize, usize))> {
        let (stored, cigar) = self.canonicalize_and_find(edge)?;
        Ok((stored, cigar.compute_lengths()))
    }

    /// Re-key an overlap after one of its endpoints was rewritten.
    /// The CIGAR is preserved; the old entry is accepted in either form.
    pub fn update_edge(&mut self, old: BiEdge, new: BiEdge) -> Result<()> {
        let cigar = match self.overlaps.remove(&old) {
            Some(c) => c,
            None => self
                .overlaps
                .remove(&old.complement())
                .ok_or(BluntifyError::NotFound {
                    edge: old.to_string(),
                })?,
        };
        self.overlaps.insert(new, cigar);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BiEdge, &Cigar)> {
        self.overlaps.iter()
    }
}
