//! Shared helpers for closure integration tests
//!
//! Builds random DAGs, mirrors them in a plain adjacency list, and
//! computes the expected closure by breadth-first search.

pub mod oracle;

pub use oracle::{random_dag, EdgeModel};

use std::sync::Arc;
use typed_dag::{Registry, RegistryConfig, RelationTypeConfig};

/// Three relation types sharing one store: a tree and two general DAGs
pub fn test_registry() -> Arc<Registry> {
    let config = RegistryConfig::new()
        .with_type(RelationTypeConfig::single(
            "hierarchy",
            "parent",
            "children",
            "ancestors",
            "descendants",
        ))
        .with_type(RelationTypeConfig::multi(
            "follows",
            "preceded_by",
            "followed_by",
            "all_preceded_by",
            "all_followed_by",
        ))
        .with_type(
            RelationTypeConfig::multi(
                "blocks",
                "blocked_by",
                "blocking",
                "all_blocked_by",
                "all_blocking",
            )
            .with_column("blocks_depth"),
        );
    Arc::new(Registry::from_config(&config).expect("test registry is valid"))
}
