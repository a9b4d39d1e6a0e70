//! SQLite storage backend for the closure table

use super::traits::{
    ClosureStore, ClosureTxn, DepthPredicate, OpenStore, RowFilter, StorageError, StorageResult,
    StoreLayout,
};
use crate::graph::{EdgeRow, VertexId};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// How long a write waits for another connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed closure store
///
/// Uses a single table holding the endpoint columns plus one INTEGER depth
/// column per relation type. Thread-safe via internal mutex on the
/// connection; every transaction is `BEGIN IMMEDIATE`, so writers never
/// interleave.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    layout: StoreLayout,
}

impl SqliteStore {
    /// Create the closure table if it is missing, then check that it
    /// carries every column the layout names.
    fn init_schema(conn: &Connection, layout: &StoreLayout) -> StorageResult<()> {
        let table = quote(&layout.table);
        let anc = quote(&layout.ancestor_column);
        let desc = quote(&layout.descendant_column);

        let depth_defs: String = layout
            .depth_columns
            .iter()
            .map(|c| {
                let col = quote(c);
                format!(",\n                {col} INTEGER NOT NULL DEFAULT 0 CHECK ({col} >= 0)")
            })
            .collect();

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                {anc} TEXT NOT NULL,
                {desc} TEXT NOT NULL{depth_defs}
            );

            CREATE INDEX IF NOT EXISTS {anc_idx} ON {table}({anc});
            CREATE INDEX IF NOT EXISTS {desc_idx} ON {table}({desc});

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
            anc_idx = quote(&format!("idx_{}_{}", layout.table, layout.ancestor_column)),
            desc_idx = quote(&format!("idx_{}_{}", layout.table, layout.descendant_column)),
        ))?;

        Self::verify_columns(conn, layout)?;

        // One row per pair and owning type
        for column in &layout.depth_columns {
            conn.execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {idx} ON {table}({anc}, {desc}) WHERE {col} > 0",
                    idx = quote(&format!("uq_{}_{}", layout.table, column)),
                    col = quote(column),
                ),
                [],
            )?;
        }

        Ok(())
    }

    /// Existing tables are never altered; a table created for a different
    /// registry is reported instead.
    fn verify_columns(conn: &Connection, layout: &StoreLayout) -> StorageResult<()> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let existing = stmt
            .query_map(params![layout.table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let required = [&layout.ancestor_column, &layout.descendant_column]
            .into_iter()
            .chain(layout.depth_columns.iter());
        for column in required {
            if !existing.iter().any(|c| c == column) {
                return Err(StorageError::Layout(format!(
                    "table {} has no column {}",
                    layout.table, column
                )));
            }
        }
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn start(&self, begin: &str) -> StorageResult<Box<dyn ClosureTxn + '_>> {
        let conn = self.lock()?;
        conn.execute_batch(begin)?;
        Ok(Box::new(SqliteTxn {
            conn,
            layout: &self.layout,
            finished: false,
        }))
    }

    fn from_connection(conn: Connection, layout: StoreLayout) -> StorageResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&conn, &layout)?;
        Ok(Self {
            conn: Mutex::new(conn),
            layout,
        })
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>, layout: StoreLayout) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, layout)
    }

    fn open_in_memory(layout: StoreLayout) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, layout)
    }
}

impl ClosureStore for SqliteStore {
    fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn begin(&self) -> StorageResult<Box<dyn ClosureTxn + '_>> {
        self.start("BEGIN IMMEDIATE")
    }

    /// Deferred transaction; under WAL it reads a snapshot and never
    /// blocks on another connection's writer
    fn begin_read(&self) -> StorageResult<Box<dyn ClosureTxn + '_>> {
        self.start("BEGIN DEFERRED")
    }
}

/// A transaction holding the connection lock until commit or drop
struct SqliteTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    layout: &'a StoreLayout,
    finished: bool,
}

impl SqliteTxn<'_> {
    /// Column list in row order: ancestor, descendant, depth slots
    fn columns(&self) -> String {
        [&self.layout.ancestor_column, &self.layout.descendant_column]
            .into_iter()
            .chain(self.layout.depth_columns.iter())
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build the WHERE clause and its parameters for a filter.
    ///
    /// Depth bounds are integers and are inlined; vertex ids are bound.
    fn where_clause(&self, filter: &RowFilter) -> StorageResult<(String, Vec<String>)> {
        let own = self
            .layout
            .depth_columns
            .get(filter.slot)
            .ok_or_else(|| StorageError::Layout(format!("no depth slot {}", filter.slot)))?;

        let mut clauses = vec![depth_sql(&quote(own), filter.depth)];
        for (slot, column) in self.layout.depth_columns.iter().enumerate() {
            if slot != filter.slot {
                clauses.push(format!("{} = 0", quote(column)));
            }
        }

        let mut params = Vec::new();
        if let Some(ref ancestor) = filter.ancestor {
            params.push(ancestor.as_str().to_string());
            clauses.push(format!(
                "{} = ?{}",
                quote(&self.layout.ancestor_column),
                params.len()
            ));
        }
        if let Some(ref descendant) = filter.descendant {
            params.push(descendant.as_str().to_string());
            clauses.push(format!(
                "{} = ?{}",
                quote(&self.layout.descendant_column),
                params.len()
            ));
        }

        Ok((clauses.join(" AND "), params))
    }

    fn query_rows(&self, sql: &str, params: &[String]) -> StorageResult<Vec<EdgeRow>> {
        let slot_count = self.layout.slot_count();
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut depths = Vec::with_capacity(slot_count);
                for i in 0..slot_count {
                    depths.push(row.get::<_, u32>(2 + i)?);
                }
                Ok(EdgeRow {
                    ancestor: VertexId::from_string(row.get::<_, String>(0)?),
                    descendant: VertexId::from_string(row.get::<_, String>(1)?),
                    depths,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl ClosureTxn for SqliteTxn<'_> {
    fn slot_count(&self) -> usize {
        self.layout.slot_count()
    }

    fn insert_row(&mut self, row: &EdgeRow) -> StorageResult<()> {
        if row.depths.len() != self.layout.slot_count() {
            return Err(StorageError::Layout(format!(
                "row has {} depth slots, table has {}",
                row.depths.len(),
                self.layout.slot_count()
            )));
        }

        let placeholders: Vec<String> = (1..=row.depths.len() + 2).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&self.layout.table),
            self.columns(),
            placeholders.join(", ")
        );

        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(row.ancestor.as_str().to_string()),
            Box::new(row.descendant.as_str().to_string()),
        ];
        for depth in &row.depths {
            params_vec.push(Box::new(*depth));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

        self.conn.execute(&sql, params_refs.as_slice())?;
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
        let (clause, params) = self.where_clause(&filter)?;

        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {}",
            quote(&self.layout.table),
            quote(&self.layout.depth_columns[slot]),
            depth,
            clause
        );
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    fn select(&self, filter: &RowFilter) -> StorageResult<Vec<EdgeRow>> {
        let (clause, params) = self.where_clause(filter)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.columns(),
            quote(&self.layout.table),
            clause
        );
        self.query_rows(&sql, &params)
    }

    fn delete(&mut self, filter: &RowFilter) -> StorageResult<usize> {
        let (clause, params) = self.where_clause(filter)?;
        let sql = format!("DELETE FROM {} WHERE {}", quote(&self.layout.table), clause);
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    fn all_rows(&self) -> StorageResult<Vec<EdgeRow>> {
        let sql = format!("SELECT {} FROM {}", self.columns(), quote(&self.layout.table));
        self.query_rows(&sql, &[])
    }

    fn delete_all_for_vertex(&mut self, vertex: &VertexId) -> StorageResult<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 OR {} = ?1",
            quote(&self.layout.table),
            quote(&self.layout.ancestor_column),
            quote(&self.layout.descendant_column)
        );
        Ok(self.conn.execute(&sql, params![vertex.as_str()])?)
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "closure transaction rollback failed");
            }
        }
    }
}

/// Identifiers are validated by the registry; quoting keeps keywords usable
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

fn depth_sql(column: &str, depth: DepthPredicate) -> String {
    match depth.bounds() {
        (lo, u32::MAX) => format!("{column} >= {lo}"),
        (lo, hi) if lo == hi => format!("{column} = {lo}"),
        (lo, hi) => format!("{column} BETWEEN {lo} AND {hi}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StoreLayout {
        StoreLayout {
            table: "relations".into(),
            ancestor_column: "from_id".into(),
            descendant_column: "to_id".into(),
            depth_columns: vec!["hierarchy".into(), "follows".into()],
        }
    }

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory(layout()).unwrap()
    }

    #[test]
    fn test_insert_direct_and_select() {
        let store = create_test_store();
        let mut txn = store.begin().unwrap();
        txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        let rows = txn.rows_matching(&RowFilter::for_slot(0).direct()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ancestor.as_str(), "a");
        assert_eq!(rows[0].descendant.as_str(), "b");
        assert_eq!(rows[0].depths, vec![1, 0]);

        // Rows of one type are invisible to the other
        assert!(txn.rows_matching(&RowFilter::for_slot(1)).unwrap().is_empty());
    }

    #[test]
    fn test_rollback_on_drop() {
        let store = create_test_store();
        {
            let mut txn = store.begin().unwrap();
            txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
        }
        assert!(store.snapshot().unwrap().is_empty());

        // The connection is usable again after the rollback
        let mut txn = store.begin().unwrap();
        txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
        txn.commit().unwrap();
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_direct_edge() {
        let store = create_test_store();
        let mut txn = store.begin().unwrap();
        txn.insert_direct(1, &"a".into(), &"b".into()).unwrap();
        let err = txn.insert_direct(1, &"a".into(), &"b".into()).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateEdge { .. }));
    }

    #[test]
    fn test_unique_index_rejects_second_row_for_same_type() {
        let store = create_test_store();
        let mut txn = store.begin().unwrap();
        let row = EdgeRow::owned(2, 0, "a".into(), "c".into(), 2);
        txn.insert_row(&row).unwrap();
        assert!(matches!(txn.insert_row(&row), Err(StorageError::Database(_))));
    }

    #[test]
    fn test_depth_filters() {
        let store = create_test_store();
        let mut txn = store.begin().unwrap();
        txn.upsert_min(0, &"a".into(), &"b".into(), 1).unwrap();
        txn.upsert_min(0, &"a".into(), &"c".into(), 2).unwrap();
        txn.upsert_min(0, &"a".into(), &"d".into(), 3).unwrap();

        let base = RowFilter::for_slot(0).with_ancestor("a".into());
        let count = |depth| txn.rows_matching(&base.clone().with_depth(depth)).unwrap().len();
        assert_eq!(count(DepthPredicate::Any), 3);
        assert_eq!(count(DepthPredicate::Exactly(2)), 1);
        assert_eq!(count(DepthPredicate::AtLeast(2)), 2);
        assert_eq!(count(DepthPredicate::AtMost(2)), 2);
        assert_eq!(count(DepthPredicate::Between(2, 3)), 2);
    }

    #[test]
    fn test_update_depth_keeps_other_slots_zero() {
        let store = create_test_store();
        let mut txn = store.begin().unwrap();
        txn.upsert_min(1, &"a".into(), &"c".into(), 3).unwrap();
        txn.insert_direct(1, &"a".into(), &"c".into()).unwrap();

        let row = txn.pair(1, &"a".into(), &"c".into()).unwrap().unwrap();
        assert_eq!(row.depths, vec![0, 1]);
    }

    #[test]
    fn test_delete_rows_and_vertex() {
        let store = create_test_store();
        let mut txn = store.begin().unwrap();
        txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
        txn.upsert_min(0, &"a".into(), &"c".into(), 2).unwrap();
        txn.insert_direct(1, &"b".into(), &"d".into()).unwrap();

        let removed = txn
            .delete_rows(&RowFilter::for_slot(0).with_depth(DepthPredicate::AtLeast(2)))
            .unwrap();
        assert_eq!(removed, 1);

        assert_eq!(txn.delete_all_for_vertex(&"b".into()).unwrap(), 2);
        assert!(txn.all_rows().unwrap().is_empty());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dag.db");

        {
            let store = SqliteStore::open(&path, layout()).unwrap();
            let mut txn = store.begin().unwrap();
            txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
            txn.commit().unwrap();
        }

        let store = SqliteStore::open(&path, layout()).unwrap();
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_read_during_write_on_other_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dag.db");

        // Two stores on the same file
        let writer = SqliteStore::open(&path, layout()).unwrap();
        let reader = SqliteStore::open(&path, layout()).unwrap();

        let mut txn = writer.begin().unwrap();
        txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
        txn.commit().unwrap();

        let mut txn = writer.begin().unwrap();
        txn.insert_direct(0, &"b".into(), &"c".into()).unwrap();

        // The reader sees the committed state while the write is open
        let rows = reader.snapshot().unwrap();
        assert_eq!(rows.len(), 1, "concurrent read must succeed during write (WAL mode)");
        let read = reader.begin_read().unwrap();
        assert!(read
            .rows_matching(&RowFilter::for_slot(0).with_ancestor("b".into()))
            .unwrap()
            .is_empty());
        drop(read);

        txn.commit().unwrap();
        assert_eq!(reader.snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_reopen_with_foreign_layout_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dag.db");
        SqliteStore::open(&path, layout()).unwrap();

        let mut other = layout();
        other.depth_columns.push("dependency".into());
        let err = SqliteStore::open(&path, other).err().unwrap();
        assert!(matches!(err, StorageError::Layout(_)));
    }

    #[test]
    fn test_keyword_identifiers_are_quoted() {
        let layout = StoreLayout {
            table: "order".into(),
            ancestor_column: "from".into(),
            descendant_column: "to".into(),
            depth_columns: vec!["group".into()],
        };
        let store = SqliteStore::open_in_memory(layout).unwrap();
        let mut txn = store.begin().unwrap();
        txn.insert_direct(0, &"a".into(), &"b".into()).unwrap();
        txn.commit().unwrap();
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }
}
