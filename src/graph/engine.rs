//! TypedDag: the main entry point for maintaining and querying hierarchies

use super::closure;
use super::vertex::VertexId;
use crate::query::{ClosureQuery, RelationQueries};
use crate::registry::{Navigation, Registry, RelationType};
use crate::storage::{ClosureStore, MemoryStore, OpenStore, SqliteStore, StorageError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in hierarchy operations
#[derive(Debug, Error)]
pub enum DagError {
    #[error("Unknown relation type: {0}")]
    UnknownRelationType(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("{relation}: direct edge {ancestor} -> {descendant} already exists")]
    DuplicateEdge {
        relation: String,
        ancestor: VertexId,
        descendant: VertexId,
    },

    #[error("{relation}: {child} already has parent {existing_parent}")]
    CardinalityViolation {
        relation: String,
        child: VertexId,
        existing_parent: VertexId,
    },

    #[error("{relation}: {vertex} cannot be its own parent")]
    SelfEdge { relation: String, vertex: VertexId },

    #[error("{relation}: no direct edge {ancestor} -> {descendant}")]
    EdgeNotFound {
        relation: String,
        ancestor: VertexId,
        descendant: VertexId,
    },

    #[error("Store layout does not match the registry")]
    LayoutMismatch,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

/// Result type for hierarchy operations
pub type DagResult<T> = Result<T, DagError>;

/// Several typed hierarchies over one vertex set, sharing one closure store.
///
/// Every mutating call runs in a single store transaction: it either
/// commits its whole closure update or leaves the store untouched.
pub struct TypedDag<S: ClosureStore> {
    registry: Arc<Registry>,
    store: S,
}

impl TypedDag<SqliteStore> {
    /// Open (or create) a SQLite-backed hierarchy set at `path`
    pub fn open(path: impl AsRef<Path>, registry: Arc<Registry>) -> DagResult<Self> {
        let store = SqliteStore::open(path, registry.layout().clone())?;
        Self::new(registry, store)
    }
}

impl TypedDag<MemoryStore> {
    pub fn in_memory(registry: Arc<Registry>) -> Self {
        let store = MemoryStore::new(registry.layout().clone());
        Self { registry, store }
    }
}

impl<S: ClosureStore> TypedDag<S> {
    pub fn new(registry: Arc<Registry>, store: S) -> DagResult<Self> {
        if store.layout() != registry.layout() {
            return Err(DagError::LayoutMismatch);
        }
        Ok(Self { registry, store })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up a relation type, failing for names the registry lacks
    pub fn relation(&self, name: &str) -> DagResult<&RelationType> {
        self.registry
            .get(name)
            .ok_or_else(|| DagError::UnknownRelationType(name.to_string()))
    }

    /// Add the direct edge `parent -> child` under `relation`
    pub fn add_edge(&self, relation: &str, parent: &VertexId, child: &VertexId) -> DagResult<()> {
        let relation = self.relation(relation)?;
        let mut txn = self.store.begin()?;

        match closure::insert_edge(&mut *txn, relation, parent, child) {
            Ok(written) => {
                txn.commit()?;
                tracing::debug!(relation = %relation.name, %parent, %child, written, "edge added");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(relation = %relation.name, %parent, %child, error = %e, "edge rejected");
                Err(e)
            }
        }
    }

    /// Remove the direct edge `parent -> child` under `relation`
    pub fn remove_edge(
        &self,
        relation: &str,
        parent: &VertexId,
        child: &VertexId,
    ) -> DagResult<()> {
        let relation = self.relation(relation)?;
        let mut txn = self.store.begin()?;

        match closure::remove_edge(&mut *txn, relation, parent, child) {
            Ok((removed, restored)) => {
                txn.commit()?;
                tracing::debug!(
                    relation = %relation.name,
                    %parent,
                    %child,
                    removed,
                    restored,
                    "edge removed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(relation = %relation.name, %parent, %child, error = %e, "edge removal rejected");
                Err(e)
            }
        }
    }

    /// Remove `vertex` from every hierarchy.
    ///
    /// Relation types whose delete policy cascades pull their related
    /// vertices along. Returns every vertex taken out, `vertex` first, so
    /// the host can delete the matching objects.
    pub fn remove_vertex(&self, vertex: &VertexId) -> DagResult<Vec<VertexId>> {
        let mut txn = self.store.begin()?;
        let mut removed = Vec::new();
        let mut seen = HashSet::new();
        let mut pending = vec![vertex.clone()];

        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            let mut cascade = closure::cascade_targets(&*txn, &self.registry, &next)?;
            cascade.reverse();
            pending.extend(cascade);

            let edges = closure::detach_vertex(&mut *txn, &self.registry, &next)?;
            tracing::debug!(vertex = %next, edges, "vertex detached");
            removed.push(next);
        }

        txn.commit()?;
        Ok(removed)
    }

    /// Queries for one relation type
    pub fn queries(&self, relation: &str) -> DagResult<RelationQueries<'_>> {
        let relation = self.relation(relation)?;
        Ok(RelationQueries::new(&self.store, relation))
    }

    /// Resolve a configured view name (`"parent"`, `"ancestors"`,
    /// `"self_and_descendants"`, ...) for `vertex`
    pub fn navigate(&self, view: &str, vertex: &VertexId) -> DagResult<ClosureQuery<'_>> {
        let (relation, navigation) = self
            .registry
            .view(view)
            .ok_or_else(|| DagError::UnknownView(view.to_string()))?;
        let queries = RelationQueries::new(&self.store, relation);

        Ok(match navigation {
            Navigation::Parents => queries.direct_parents(vertex),
            Navigation::Children => queries.direct_children(vertex),
            Navigation::Ancestors => queries.all_ancestors(vertex),
            Navigation::Descendants => queries.all_descendants(vertex),
            Navigation::SelfAndAncestors => queries.self_and_ancestors(vertex),
            Navigation::SelfAndDescendants => queries.self_and_descendants(vertex),
        })
    }
}
