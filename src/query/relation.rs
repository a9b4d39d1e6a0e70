//! Navigation for one relation type

use super::closure::ClosureQuery;
use super::types::Direction;
use crate::graph::{DagResult, VertexId, DIRECT};
use crate::registry::RelationType;
use crate::storage::ClosureStore;

/// Every navigational query of one relation type.
///
/// Obtained from [`TypedDag::queries`](crate::TypedDag::queries). Set
/// queries come back as [`ClosureQuery`] builders; predicates run
/// immediately.
#[derive(Clone, Copy)]
pub struct RelationQueries<'a> {
    store: &'a dyn ClosureStore,
    relation: &'a RelationType,
}

impl<'a> RelationQueries<'a> {
    pub(crate) fn new(store: &'a dyn ClosureStore, relation: &'a RelationType) -> Self {
        Self { store, relation }
    }

    pub fn relation(&self) -> &'a RelationType {
        self.relation
    }

    fn query(&self, vertex: &VertexId, direction: Direction) -> ClosureQuery<'a> {
        ClosureQuery::new(self.store, self.relation, vertex.clone(), direction)
    }

    pub fn direct_parents(&self, vertex: &VertexId) -> ClosureQuery<'a> {
        self.query(vertex, Direction::Up).at_depth(DIRECT)
    }

    pub fn direct_children(&self, vertex: &VertexId) -> ClosureQuery<'a> {
        self.query(vertex, Direction::Down).at_depth(DIRECT)
    }

    pub fn all_ancestors(&self, vertex: &VertexId) -> ClosureQuery<'a> {
        self.query(vertex, Direction::Up)
    }

    pub fn all_descendants(&self, vertex: &VertexId) -> ClosureQuery<'a> {
        self.query(vertex, Direction::Down)
    }

    pub fn ancestors_at_depth(&self, vertex: &VertexId, depth: u32) -> ClosureQuery<'a> {
        self.all_ancestors(vertex).at_depth(depth)
    }

    pub fn descendants_at_depth(&self, vertex: &VertexId, depth: u32) -> ClosureQuery<'a> {
        self.all_descendants(vertex).at_depth(depth)
    }

    pub fn self_and_ancestors(&self, vertex: &VertexId) -> ClosureQuery<'a> {
        self.all_ancestors(vertex).including_self()
    }

    pub fn self_and_descendants(&self, vertex: &VertexId) -> ClosureQuery<'a> {
        self.all_descendants(vertex).including_self()
    }

    /// Rows in which `ancestor` is an ancestor of `vertex`
    pub fn ancestor_edge(&self, vertex: &VertexId, ancestor: &VertexId) -> ClosureQuery<'a> {
        self.all_ancestors(vertex).restricted_to(ancestor.clone())
    }

    /// Rows in which `descendant` is a descendant of `vertex`
    pub fn descendant_edge(&self, vertex: &VertexId, descendant: &VertexId) -> ClosureQuery<'a> {
        self.all_descendants(vertex).restricted_to(descendant.clone())
    }

    /// No direct children
    pub fn is_leaf(&self, vertex: &VertexId) -> DagResult<bool> {
        Ok(!self.direct_children(vertex).exists()?)
    }

    /// At least one direct parent
    pub fn has_parent(&self, vertex: &VertexId) -> DagResult<bool> {
        self.direct_parents(vertex).exists()
    }

    /// The direct parent; for multi-parent types, the lowest id among them
    pub fn parent(&self, vertex: &VertexId) -> DagResult<Option<VertexId>> {
        Ok(self.direct_parents(vertex).vertices()?.into_iter().next())
    }

    /// True iff `other` is an ancestor or a descendant of `vertex`
    pub fn in_closure(&self, vertex: &VertexId, other: &VertexId) -> DagResult<bool> {
        self.query(vertex, Direction::Both).contains(other)
    }

    /// Shortest path length from `ancestor` down to `descendant`
    pub fn distance(&self, ancestor: &VertexId, descendant: &VertexId) -> DagResult<Option<u32>> {
        Ok(self
            .descendant_edge(ancestor, descendant)
            .with_depths()?
            .first()
            .map(|r| r.depth))
    }
}

impl std::fmt::Debug for RelationQueries<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationQueries")
            .field("relation", &self.relation.name)
            .finish_non_exhaustive()
    }
}
