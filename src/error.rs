use thiserror::Error;

/// Error taxonomy for the bluntification pipeline.
///
/// `NotDominoFree` is a sentinel used inside the biclique cover to fall
/// through from the exact algorithm to the heuristic; it never escapes to
/// the caller. Everything else is fatal.
#[derive(Error, Debug)]
pub enum BluntifyError {
    /// Unparseable GFA or CIGAR content, with line context
    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },

    /// An edge was looked up in the overlap map in both orientations and
    /// found in neither. Indicates an edge-rewrite inconsistency.
    #[error("edge not found in overlaps: {edge}")]
    NotFound { edge: String },

    /// An overlap claims more bases than its node holds
    #[error("overlap of length {overlap} exceeds node {node} of length {length}")]
    OverlongOverlap {
        node: usize,
        overlap: usize,
        length: usize,
    },

    /// A biclique terminus lost its parent adjacency during duplication
    #[error("biclique terminus does not have any parent: {0}")]
    DanglingTerminus(usize),

    /// Internal sentinel: the bipartite block is not domino-free
    #[error("bipartite block is not domino free")]
    NotDominoFree,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BluntifyError>;
