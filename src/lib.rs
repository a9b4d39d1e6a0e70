//! typed-dag: Typed DAG Hierarchies over a Closure Table
//!
//! Several independent hierarchies ("relation types") share one vertex set
//! and one physical closure table. Every ancestor/descendant pair is
//! materialised with its shortest depth, so navigation never recurses.
//!
//! # Core Concepts
//!
//! - **Registry**: the relation types, their depth columns, cardinality and
//!   view names, fixed at startup
//! - **Closure rows**: `(ancestor, descendant, depth per type)`; exactly one
//!   type owns a row, every other slot holds 0
//! - **Maintenance**: adding or removing direct edges keeps the closure
//!   consistent inside one store transaction
//! - **Queries**: parents, children, ancestors, descendants and depth
//!   filtered variants, built lazily and evaluated on demand
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use typed_dag::{Registry, TypedDag, VertexId};
//!
//! let registry = Registry::from_yaml_str(r#"
//! types:
//!   - name: hierarchy
//!     up: { name: parent, limit: 1 }
//!     down: children
//!     all_up: ancestors
//!     all_down: descendants
//! "#).unwrap();
//! let dag = TypedDag::in_memory(Arc::new(registry));
//!
//! let (a, b, c) = (VertexId::from("a"), VertexId::from("b"), VertexId::from("c"));
//! dag.add_edge("hierarchy", &a, &b).unwrap();
//! dag.add_edge("hierarchy", &b, &c).unwrap();
//!
//! let descendants = dag.queries("hierarchy").unwrap().all_descendants(&a);
//! assert_eq!(descendants.vertices().unwrap(), vec![b, c]);
//! ```

mod graph;
pub mod query;
pub mod registry;
pub mod storage;

pub use graph::{DagError, DagResult, EdgeRow, TypedDag, VertexId, DIRECT, NOT_APPLICABLE};
pub use query::{ClosureQuery, Direction, Related, RelationQueries};
pub use registry::{
    Cardinality, ConfigError, DeleteAction, Navigation, Registry, RegistryConfig, RelationType,
    RelationTypeConfig, VertexDeletePolicy,
};
pub use storage::{
    ClosureStore, ClosureTxn, DepthPredicate, MemoryStore, OpenStore, RowFilter, SqliteStore,
    StorageError, StorageResult, StoreLayout,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
