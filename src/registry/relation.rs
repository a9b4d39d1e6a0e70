//! Relation type definitions

use serde::{Deserialize, Serialize};

/// How many direct parents a vertex may have under one relation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Tree: at most one direct parent
    Single,
    /// General DAG: any number of direct parents
    #[default]
    Multi,
}

/// What happens to related vertices when a vertex is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteAction {
    /// Only the closure rows touching the removed vertex go away
    #[default]
    Detach,
    /// The related vertices are removed as well
    Cascade,
}

/// Per-direction deletion policy for one relation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VertexDeletePolicy {
    #[serde(default)]
    pub ancestors: DeleteAction,
    #[serde(default)]
    pub descendants: DeleteAction,
}

impl VertexDeletePolicy {
    pub fn cascades(&self) -> bool {
        self.ancestors == DeleteAction::Cascade || self.descendants == DeleteAction::Cascade
    }
}

/// The navigational views every relation type exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Navigation {
    Parents,
    Children,
    Ancestors,
    Descendants,
    SelfAndAncestors,
    SelfAndDescendants,
}

/// A configured hierarchy sharing the closure table with its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationType {
    /// Unique key of the hierarchy (e.g. "hierarchy", "follows")
    pub name: String,
    /// Column carrying this type's depth in the closure table
    pub depth_column: String,
    /// Position of the depth column among all registered types
    pub slot: usize,
    pub cardinality: Cardinality,
    /// Name of the direct-parent view
    pub up: String,
    /// Name of the direct-children view
    pub down: String,
    /// Name of the all-ancestors view
    pub all_up: String,
    /// Name of the all-descendants view
    pub all_down: String,
    pub on_vertex_delete: VertexDeletePolicy,
}

impl RelationType {
    pub fn is_single(&self) -> bool {
        self.cardinality == Cardinality::Single
    }

    /// Every view name this type answers to, paired with its navigation
    pub fn views(&self) -> [(String, Navigation); 6] {
        [
            (self.up.clone(), Navigation::Parents),
            (self.down.clone(), Navigation::Children),
            (self.all_up.clone(), Navigation::Ancestors),
            (self.all_down.clone(), Navigation::Descendants),
            (format!("self_and_{}", self.all_up), Navigation::SelfAndAncestors),
            (format!("self_and_{}", self.all_down), Navigation::SelfAndDescendants),
        ]
    }
}
