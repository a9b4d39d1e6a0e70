//! Relation-type registry
//!
//! The registry is built once from a [`RegistryConfig`] and is read-only
//! afterwards. It maps relation type names and navigational view names to
//! the [`RelationType`] that the maintenance and query layers are
//! parameterised by, and derives the physical [`StoreLayout`] every
//! closure store must agree on.

mod config;
mod relation;

pub use config::{ConfigError, RegistryConfig, RelationTypeConfig, UpConfig};
pub use relation::{Cardinality, DeleteAction, Navigation, RelationType, VertexDeletePolicy};

use crate::storage::StoreLayout;
use std::collections::HashMap;
use std::path::Path;

/// All relation types sharing one closure table
#[derive(Debug, Clone)]
pub struct Registry {
    types: Vec<RelationType>,
    by_name: HashMap<String, usize>,
    by_view: HashMap<String, (usize, Navigation)>,
    layout: StoreLayout,
}

impl Registry {
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        let types = config.resolve()?;

        let by_name = types
            .iter()
            .map(|t| (t.name.clone(), t.slot))
            .collect();
        let by_view = types
            .iter()
            .flat_map(|t| {
                t.views()
                    .into_iter()
                    .map(move |(view, nav)| (view, (t.slot, nav)))
            })
            .collect();
        let layout = StoreLayout {
            table: config.table.clone(),
            ancestor_column: config.ancestor_column.clone(),
            descendant_column: config.descendant_column.clone(),
            depth_columns: types.iter().map(|t| t.depth_column.clone()).collect(),
        };

        Ok(Self {
            types,
            by_name,
            by_view,
            layout,
        })
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_config(&RegistryConfig::from_yaml_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_config(&RegistryConfig::from_json_str(s)?)
    }

    /// Load a registry file; `.json` files are read as JSON, anything else as YAML
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Look up a relation type by name
    pub fn get(&self, name: &str) -> Option<&RelationType> {
        self.by_name.get(name).map(|slot| &self.types[*slot])
    }

    /// Resolve a navigational view name (e.g. "ancestors", "self_and_children")
    pub fn view(&self, name: &str) -> Option<(&RelationType, Navigation)> {
        self.by_view
            .get(name)
            .map(|(slot, nav)| (&self.types[*slot], *nav))
    }

    pub fn types(&self) -> &[RelationType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }
}
