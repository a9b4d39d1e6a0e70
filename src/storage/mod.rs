//! Storage backends for the closure table
//!
//! Backends implement the `ClosureStore` trait. `SqliteStore` persists the
//! table; `MemoryStore` keeps it in process for tests and embedding.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    ClosureStore, ClosureTxn, DepthPredicate, OpenStore, RowFilter, StorageError, StorageResult,
    StoreLayout,
};
