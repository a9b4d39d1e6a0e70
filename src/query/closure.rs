//! Composable closure queries

use super::types::{Direction, Related};
use crate::graph::{DagResult, EdgeRow, VertexId};
use crate::registry::RelationType;
use crate::storage::{ClosureStore, DepthPredicate, RowFilter};
use std::collections::HashMap;

/// A deferred query over one relation type's closure rows.
///
/// Builder methods narrow the query; nothing touches the store until
/// [`rows`](Self::rows), [`with_depths`](Self::with_depths) or one of the
/// other materialising calls runs. Each call reads in its own read
/// transaction. The same query can be materialised
/// any number of times and always reflects the store at that moment.
#[derive(Clone)]
pub struct ClosureQuery<'a> {
    store: &'a dyn ClosureStore,
    slot: usize,
    origin: VertexId,
    direction: Direction,
    depth: DepthPredicate,
    include_self: bool,
    /// False once a depth restriction excludes depth 0
    origin_in_range: bool,
    other: Option<VertexId>,
    limit: Option<usize>,
}

impl<'a> ClosureQuery<'a> {
    pub(crate) fn new(
        store: &'a dyn ClosureStore,
        relation: &RelationType,
        origin: VertexId,
        direction: Direction,
    ) -> Self {
        Self {
            store,
            slot: relation.slot,
            origin,
            direction,
            depth: DepthPredicate::Any,
            include_self: false,
            origin_in_range: true,
            other: None,
            limit: None,
        }
    }

    /// Only vertices exactly `depth` hops away
    pub fn at_depth(mut self, depth: u32) -> Self {
        self.depth = self.depth.and(DepthPredicate::Exactly(depth));
        self.origin_in_range &= depth == 0;
        self
    }

    /// Only vertices at most `depth` hops away
    pub fn at_most(mut self, depth: u32) -> Self {
        self.depth = self.depth.and(DepthPredicate::AtMost(depth));
        self
    }

    /// Only vertices at least `depth` hops away
    pub fn at_least(mut self, depth: u32) -> Self {
        self.depth = self.depth.and(DepthPredicate::AtLeast(depth));
        self.origin_in_range &= depth == 0;
        self
    }

    /// Add the origin itself, at depth 0, unless a depth restriction
    /// rules out 0
    pub fn including_self(mut self) -> Self {
        self.include_self = true;
        self
    }

    /// Only consider the far endpoint `vertex`
    pub fn restricted_to(mut self, vertex: VertexId) -> Self {
        self.other = Some(vertex);
        self
    }

    /// Cap the number of vertices returned
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn origin(&self) -> &VertexId {
        &self.origin
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn depth(&self) -> DepthPredicate {
        self.depth
    }

    /// The store filters this query runs, one per side it looks at
    pub fn row_filters(&self) -> Vec<RowFilter> {
        let base = RowFilter::for_slot(self.slot).with_depth(self.depth);
        let up = || {
            let filter = base.clone().with_descendant(self.origin.clone());
            match &self.other {
                Some(other) => filter.with_ancestor(other.clone()),
                None => filter,
            }
        };
        let down = || {
            let filter = base.clone().with_ancestor(self.origin.clone());
            match &self.other {
                Some(other) => filter.with_descendant(other.clone()),
                None => filter,
            }
        };

        match self.direction {
            Direction::Up => vec![up()],
            Direction::Down => vec![down()],
            Direction::Both => vec![up(), down()],
        }
    }

    /// Matching closure rows, unprojected.
    ///
    /// The origin has no row of its own, so `including_self` does not
    /// apply here, and neither does `limit`: several rows can name the
    /// same far endpoint.
    pub fn rows(&self) -> DagResult<Vec<EdgeRow>> {
        let txn = self.store.begin_read()?;
        let mut rows = Vec::new();
        for filter in self.row_filters() {
            rows.extend(txn.rows_matching(&filter)?);
        }
        Ok(rows)
    }

    /// Far endpoints with their shortest depth, ordered by depth then id
    pub fn with_depths(&self) -> DagResult<Vec<Related>> {
        let mut best: HashMap<VertexId, u32> = HashMap::new();
        for row in self.rows()? {
            let depth = row.depth_in(self.slot);
            let vertex = if row.descendant == self.origin {
                row.ancestor
            } else {
                row.descendant
            };
            best.entry(vertex)
                .and_modify(|d| *d = (*d).min(depth))
                .or_insert(depth);
        }

        let self_allowed = self.other.as_ref().map_or(true, |o| o == &self.origin);
        if self.include_self && self.origin_in_range && self_allowed {
            best.insert(self.origin.clone(), 0);
        }

        let mut related: Vec<Related> = best
            .into_iter()
            .map(|(vertex, depth)| Related::new(vertex, depth))
            .collect();
        related.sort_by(|a, b| (a.depth, &a.vertex).cmp(&(b.depth, &b.vertex)));

        if let Some(limit) = self.limit {
            related.truncate(limit);
        }
        Ok(related)
    }

    /// Far endpoints, deduplicated, ordered by depth then id
    pub fn vertices(&self) -> DagResult<Vec<VertexId>> {
        Ok(self
            .with_depths()?
            .into_iter()
            .map(|r| r.vertex)
            .collect())
    }

    /// Whether `vertex` is among the results
    pub fn contains(&self, vertex: &VertexId) -> DagResult<bool> {
        self.clone().restricted_to(vertex.clone()).exists()
    }

    pub fn exists(&self) -> DagResult<bool> {
        Ok(!self.with_depths()?.is_empty())
    }

    pub fn count(&self) -> DagResult<usize> {
        Ok(self.with_depths()?.len())
    }
}

impl std::fmt::Debug for ClosureQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureQuery")
            .field("slot", &self.slot)
            .field("origin", &self.origin)
            .field("direction", &self.direction)
            .field("depth", &self.depth)
            .field("include_self", &self.include_self)
            .field("origin_in_range", &self.origin_in_range)
            .field("other", &self.other)
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeRow;
    use crate::registry::{Registry, RegistryConfig, RelationTypeConfig};
    use crate::storage::{ClosureTxn, MemoryStore};

    fn setup() -> (Registry, MemoryStore) {
        let registry = Registry::from_config(&RegistryConfig::new().with_type(
            RelationTypeConfig::multi("deps", "requires_directly", "required_by_directly", "requires", "required_by"),
        ))
        .unwrap();
        let store = MemoryStore::new(registry.layout().clone());

        // a -> b -> c, a -> c is materialised at depth 2
        let mut txn = store.begin().unwrap();
        for (a, d, depth) in [("a", "b", 1), ("b", "c", 1), ("a", "c", 2)] {
            txn.insert_row(&EdgeRow::owned(1, 0, a.into(), d.into(), depth))
                .unwrap();
        }
        txn.commit().unwrap();
        (registry, store)
    }

    #[test]
    fn descendants_are_ordered_by_depth() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "a".into(), Direction::Down);

        let related = query.with_depths().unwrap();
        assert_eq!(
            related,
            vec![Related::new("b".into(), 1), Related::new("c".into(), 2)]
        );
    }

    #[test]
    fn builder_narrows_by_depth() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "a".into(), Direction::Down);

        assert_eq!(query.clone().at_depth(2).vertices().unwrap(), vec![VertexId::from("c")]);
        assert_eq!(query.clone().at_most(1).vertices().unwrap(), vec![VertexId::from("b")]);
        assert_eq!(query.clone().at_least(3).count().unwrap(), 0);
        assert_eq!(query.limit(1).count().unwrap(), 1);
    }

    #[test]
    fn including_self_adds_origin_at_depth_zero() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "c".into(), Direction::Up).including_self();

        let vertices = query.vertices().unwrap();
        let expected: Vec<VertexId> = vec!["c".into(), "b".into(), "a".into()];
        assert_eq!(vertices, expected);

        // The origin only counts when the restriction allows it
        assert!(query.contains(&"c".into()).unwrap());
        assert_eq!(query.clone().restricted_to("a".into()).count().unwrap(), 1);
    }

    #[test]
    fn depth_restrictions_apply_to_origin() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "c".into(), Direction::Up).including_self();

        assert_eq!(query.clone().at_depth(2).vertices().unwrap(), vec![VertexId::from("a")]);
        assert_eq!(query.clone().at_least(1).count().unwrap(), 2);
        assert_eq!(query.clone().at_depth(0).vertices().unwrap(), vec![VertexId::from("c")]);
        // Upper bounds always admit depth 0
        assert_eq!(
            query.at_most(1).vertices().unwrap(),
            vec![VertexId::from("c"), VertexId::from("b")]
        );
    }

    #[test]
    fn rows_ignore_limit_and_origin() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "a".into(), Direction::Down)
            .including_self()
            .limit(1);

        assert_eq!(query.rows().unwrap().len(), 2);
        assert_eq!(query.vertices().unwrap(), vec![VertexId::from("a")]);
    }

    #[test]
    fn both_directions_cover_ancestors_and_descendants() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "b".into(), Direction::Both);

        assert_eq!(query.row_filters().len(), 2);
        assert!(query.contains(&"a".into()).unwrap());
        assert!(query.contains(&"c".into()).unwrap());
        assert!(!query.contains(&"b".into()).unwrap());
    }

    #[test]
    fn query_is_re_evaluated_on_every_call() {
        let (registry, store) = setup();
        let rel = registry.get("deps").unwrap();
        let query = ClosureQuery::new(&store, rel, "a".into(), Direction::Down);
        assert_eq!(query.count().unwrap(), 2);

        let mut txn = store.begin().unwrap();
        txn.insert_row(&EdgeRow::direct(1, 0, "a".into(), "d".into()))
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(query.count().unwrap(), 3);
    }
}
