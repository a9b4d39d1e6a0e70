//! Query types and result structures

use crate::graph::VertexId;

/// Which side of the origin a query looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ancestors: rows where the origin is the descendant
    Up,
    /// Descendants: rows where the origin is the ancestor
    #[default]
    Down,
    /// Both sides of the origin
    Both,
}

/// A vertex reached from a query origin, with its shortest distance.
///
/// The origin itself appears at depth 0 in `self_and_*` queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Related {
    pub vertex: VertexId,
    pub depth: u32,
}

impl Related {
    pub fn new(vertex: VertexId, depth: u32) -> Self {
        Self { vertex, depth }
    }
}
