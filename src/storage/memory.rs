//! In-memory closure store
//!
//! Keeps every row in a mutex-guarded vector. A transaction holds the
//! lock for its whole lifetime, reads straight from the committed rows
//! and copies them into a private staging area on its first write.
//! Commit swaps the staged rows in; drop discards them.

use super::traits::{ClosureStore, ClosureTxn, RowFilter, StorageError, StorageResult, StoreLayout};
use crate::graph::{EdgeRow, VertexId};
use std::sync::{Mutex, MutexGuard};

pub struct MemoryStore {
    rows: Mutex<Vec<EdgeRow>>,
    layout: StoreLayout,
}

impl MemoryStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            layout,
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl ClosureStore for MemoryStore {
    fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn begin(&self) -> StorageResult<Box<dyn ClosureTxn + '_>> {
        let committed = self.rows.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(Box::new(MemoryTxn {
            committed,
            staged: None,
            slot_count: self.layout.slot_count(),
        }))
    }
}

struct MemoryTxn<'a> {
    committed: MutexGuard<'a, Vec<EdgeRow>>,
    staged: Option<Vec<EdgeRow>>,
    slot_count: usize,
}

impl MemoryTxn<'_> {
    fn rows(&self) -> &[EdgeRow] {
        self.staged.as_deref().unwrap_or(self.committed.as_slice())
    }

    fn rows_mut(&mut self) -> &mut Vec<EdgeRow> {
        let committed = &self.committed;
        self.staged.get_or_insert_with(|| committed.to_vec())
    }
}

impl ClosureTxn for MemoryTxn<'_> {
    fn slot_count(&self) -> usize {
        self.slot_count
    }

    fn insert_row(&mut self, row: &EdgeRow) -> StorageResult<()> {
        if row.depths.len() != self.slot_count {
            return Err(StorageError::Layout(format!(
                "row has {} depth slots, store has {}",
                row.depths.len(),
                self.slot_count
            )));
        }
        self.rows_mut().push(row.clone());
        Ok(())
    }

    fn update_depth(
        &mut self,
        slot: usize,
        ancestor: &VertexId,
        descendant: &VertexId,
        depth: u32,
    ) -> StorageResult<usize> {
        let filter = RowFilter::for_slot(slot)
            .with_ancestor(ancestor.clone())
            .with_descendant(descendant.clone());
        let mut updated = 0;
        for row in self.rows_mut().iter_mut().filter(|row| filter.matches(row)) {
            row.depths[slot] = depth;
            updated += 1;
        }
        Ok(updated)
    }

    fn select(&self, filter: &RowFilter) -> StorageResult<Vec<EdgeRow>> {
        Ok(self
            .rows()
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    fn delete(&mut self, filter: &RowFilter) -> StorageResult<usize> {
        let rows = self.rows_mut();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok(before - rows.len())
    }

    fn all_rows(&self) -> StorageResult<Vec<EdgeRow>> {
        Ok(self.rows().to_vec())
    }

    fn delete_all_for_vertex(&mut self, vertex: &VertexId) -> StorageResult<usize> {
        let rows = self.rows_mut();
        let before = rows.len();
        rows.retain(|row| !row.touches(vertex));
        Ok(before - rows.len())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        if let Some(staged) = self.staged.take() {
            *self.committed = staged;
        }
        Ok(())
    }
}
