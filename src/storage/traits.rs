//! Storage trait definitions

use crate::graph::{EdgeRow, VertexId, DIRECT};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("closure table does not match layout: {0}")]
    Layout(String),

    #[error("direct edge {ancestor} -> {descendant} already exists")]
    DuplicateEdge {
        ancestor: VertexId,
        descendant: VertexId,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Physical shape of the closure table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub table: String,
    pub ancestor_column: String,
    pub descendant_column: String,
    /// One depth column per relation type, in slot order
    pub depth_columns: Vec<String>,
}

impl StoreLayout {
    pub fn slot_count(&self) -> usize {
        self.depth_columns.len()
    }
}

/// Condition on the depth slot of the type a filter targets.
///
/// A depth of 0 never matches: that value marks a row owned by another type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthPredicate {
    /// Any depth of 1 or more
    #[default]
    Any,
    Exactly(u32),
    AtLeast(u32),
    AtMost(u32),
    /// Inclusive range
    Between(u32, u32),
}

impl DepthPredicate {
    pub fn matches(&self, depth: u32) -> bool {
        if depth == 0 {
            return false;
        }
        match *self {
            DepthPredicate::Any => true,
            DepthPredicate::Exactly(d) => depth == d,
            DepthPredicate::AtLeast(min) => depth >= min,
            DepthPredicate::AtMost(max) => depth <= max,
            DepthPredicate::Between(min, max) => depth >= min && depth <= max,
        }
    }

    /// Combine with another predicate; both must hold
    pub fn and(self, other: DepthPredicate) -> DepthPredicate {
        let (lo_a, hi_a) = self.bounds();
        let (lo_b, hi_b) = other.bounds();
        DepthPredicate::Between(lo_a.max(lo_b), hi_a.min(hi_b)).simplify()
    }

    /// Inclusive bounds, with depth 0 excluded
    pub fn bounds(&self) -> (u32, u32) {
        match *self {
            DepthPredicate::Any => (1, u32::MAX),
            DepthPredicate::Exactly(d) => (d.max(1), d),
            DepthPredicate::AtLeast(min) => (min.max(1), u32::MAX),
            DepthPredicate::AtMost(max) => (1, max),
            DepthPredicate::Between(min, max) => (min.max(1), max),
        }
    }

    fn simplify(self) -> DepthPredicate {
        match self.bounds() {
            (1, u32::MAX) => DepthPredicate::Any,
            (lo, hi) if lo == hi => DepthPredicate::Exactly(lo),
            (lo, u32::MAX) => DepthPredicate::AtLeast(lo),
            (1, hi) => DepthPredicate::AtMost(hi),
            (lo, hi) => DepthPredicate::Between(lo, hi),
        }
    }
}

/// Selection of closure rows visible to one relation type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    /// Slot of the type the rows must belong to
    pub slot: usize,
    pub depth: DepthPredicate,
    pub ancestor: Option<VertexId>,
    pub descendant: Option<VertexId>,
}

impl RowFilter {
    /// All rows owned by `slot`
    pub fn for_slot(slot: usize) -> Self {
        Self {
            slot,
            depth: DepthPredicate::Any,
            ancestor: None,
            descendant: None,
        }
    }

    pub fn with_depth(mut self, depth: DepthPredicate) -> Self {
        self.depth = depth;
        self
    }

    pub fn direct(self) -> Self {
        self.with_depth(DepthPredicate::Exactly(DIRECT))
    }

    pub fn with_ancestor(mut self, ancestor: VertexId) -> Self {
        self.ancestor = Some(ancestor);
        self
    }

    pub fn with_descendant(mut self, descendant: VertexId) -> Self {
        self.descendant = Some(descendant);
        self
    }

    /// Row-level evaluation, shared by backends that filter in memory
    pub fn matches(&self, row: &EdgeRow) -> bool {
        row.is_claimed_only_by(self.slot)
            && self.depth.matches(row.depth_in(self.slot))
            && self.ancestor.as_ref().map_or(true, |a| &row.ancestor == a)
            && self.descendant.as_ref().map_or(true, |d| &row.descendant == d)
    }
}

/// One atomic unit of work against the closure table.
///
/// Dropping a transaction without calling [`ClosureTxn::commit`] discards
/// every change made through it.
pub trait ClosureTxn {
    /// Number of depth slots in every row
    fn slot_count(&self) -> usize;

    // === Primitives supplied by the backend ===

    /// Insert a row as given
    fn insert_row(&mut self, row: &EdgeRow) -> StorageResult<()>;

    /// Set the depth of the row owned by `slot` between two vertices
    fn update_depth(
        &mut self,
        slot: usize,
        ancestor: &VertexId,
        descendant: &VertexId,
        depth: u32,
    ) -> StorageResult<usize>;

    /// Rows matching a filter
    fn select(&self, filter: &RowFilter) -> StorageResult<Vec<EdgeRow>>;

    /// Delete rows matching a filter, returning how many went away
    fn delete(&mut self, filter: &RowFilter) -> StorageResult<usize>;

    /// Every row regardless of owner
    fn all_rows(&self) -> StorageResult<Vec<EdgeRow>>;

    /// Delete every row, of any type, touching `vertex`
    fn delete_all_for_vertex(&mut self, vertex: &VertexId) -> StorageResult<usize>;

    /// Make every change visible to other transactions
    fn commit(self: Box<Self>) -> StorageResult<()>;

    // === Closure operations built on the primitives ===

    /// Rows visible to one type's queries
    fn rows_matching(&self, filter: &RowFilter) -> StorageResult<Vec<EdgeRow>> {
        self.select(filter)
    }

    fn delete_rows(&mut self, filter: &RowFilter) -> StorageResult<usize> {
        self.delete(filter)
    }

    /// The row owned by `slot` between two vertices, if any
    fn pair(
        &self,
        slot: usize,
        ancestor: &VertexId,
        descendant: &VertexId,
    ) -> StorageResult<Option<EdgeRow>> {
        let filter = RowFilter::for_slot(slot)
            .with_ancestor(ancestor.clone())
            .with_descendant(descendant.clone());
        Ok(self.select(&filter)?.into_iter().next())
    }

    /// Insert a direct (depth 1) row for `slot`.
    ///
    /// Fails with [`StorageError::DuplicateEdge`] if the direct row exists.
    /// A derived row for the same pair is lowered to depth 1.
    fn insert_direct(
        &mut self,
        slot: usize,
        ancestor: &VertexId,
        descendant: &VertexId,
    ) -> StorageResult<()> {
        match self.pair(slot, ancestor, descendant)? {
            Some(row) if row.depth_in(slot) == DIRECT => Err(StorageError::DuplicateEdge {
                ancestor: ancestor.clone(),
                descendant: descendant.clone(),
            }),
            Some(_) => self
                .update_depth(slot, ancestor, descendant, DIRECT)
                .map(|_| ()),
            None => {
                let row = EdgeRow::direct(
                    self.slot_count(),
                    slot,
                    ancestor.clone(),
                    descendant.clone(),
                );
                self.insert_row(&row)
            }
        }
    }

    /// Record a path of `depth` hops, keeping the shorter of the new and
    /// any existing depth. Returns true if the store changed.
    fn upsert_min(
        &mut self,
        slot: usize,
        ancestor: &VertexId,
        descendant: &VertexId,
        depth: u32,
    ) -> StorageResult<bool> {
        match self.pair(slot, ancestor, descendant)? {
            Some(row) if row.depth_in(slot) <= depth => Ok(false),
            Some(_) => {
                self.update_depth(slot, ancestor, descendant, depth)?;
                Ok(true)
            }
            None => {
                let row = EdgeRow::owned(
                    self.slot_count(),
                    slot,
                    ancestor.clone(),
                    descendant.clone(),
                    depth,
                );
                self.insert_row(&row)?;
                Ok(true)
            }
        }
    }
}

/// Trait for closure table backends
///
/// Implementations must be thread-safe (Send + Sync); writers are
/// serialised by the transactions they hand out.
pub trait ClosureStore: Send + Sync {
    fn layout(&self) -> &StoreLayout;

    /// Start a write transaction
    fn begin(&self) -> StorageResult<Box<dyn ClosureTxn + '_>>;

    /// Start a transaction that only reads.
    ///
    /// It sees the committed state as of its first read and does not wait
    /// for writers. Backends without a separate read path hand out a
    /// regular transaction.
    fn begin_read(&self) -> StorageResult<Box<dyn ClosureTxn + '_>> {
        self.begin()
    }

    /// Every committed row, ordered by endpoints and depths
    fn snapshot(&self) -> StorageResult<Vec<EdgeRow>> {
        let mut rows = self.begin_read()?.all_rows()?;
        rows.sort_by(|a, b| {
            (&a.ancestor, &a.descendant, &a.depths).cmp(&(&b.ancestor, &b.descendant, &b.depths))
        });
        Ok(rows)
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: ClosureStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>, layout: StoreLayout) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory(layout: StoreLayout) -> StorageResult<Self>;
}
