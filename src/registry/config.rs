//! Registry configuration loading and validation
//!
//! A registry is described by a small document, YAML or JSON:
//!
//! ```yaml
//! table: relations
//! ancestor_column: from_id
//! descendant_column: to_id
//! types:
//!   - name: hierarchy
//!     up: { name: parent, limit: 1 }
//!     down: children
//!     all_up: ancestors
//!     all_down: descendants
//!   - name: follows
//!     up: preceded_by
//!     down: followed_by
//!     all_up: all_preceded_by
//!     all_down: all_followed_by
//!     on_vertex_delete: { descendants: cascade }
//! ```
//!
//! Types keep their document order; that order fixes each type's slot in
//! the closure rows.

use super::relation::{Cardinality, RelationType, VertexDeletePolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while building a registry
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry declares no relation types")]
    Empty,

    #[error("duplicate relation type: {0}")]
    DuplicateType(String),

    #[error("depth column {column} used by more than one relation type")]
    DuplicateColumn { column: String },

    #[error("view name {name} declared by both {first} and {second}")]
    DuplicateView {
        name: String,
        first: String,
        second: String,
    },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("up view of {relation} has limit {limit}; only 1 is supported")]
    UnsupportedLimit { relation: String, limit: u32 },
}

fn default_table() -> String {
    "relations".to_string()
}

fn default_ancestor_column() -> String {
    "from_id".to_string()
}

fn default_descendant_column() -> String {
    "to_id".to_string()
}

/// Serialized registry description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_ancestor_column")]
    pub ancestor_column: String,
    #[serde(default = "default_descendant_column")]
    pub descendant_column: String,
    pub types: Vec<RelationTypeConfig>,
}

/// The direct-parent view: a bare name, or a name with a parent limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpConfig {
    Name(String),
    Limited { name: String, limit: u32 },
}

impl UpConfig {
    fn name(&self) -> &str {
        match self {
            UpConfig::Name(name) | UpConfig::Limited { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationTypeConfig {
    pub name: String,
    /// Depth column; defaults to the type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub up: UpConfig,
    pub down: String,
    pub all_up: String,
    pub all_down: String,
    #[serde(default)]
    pub on_vertex_delete: VertexDeletePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            ancestor_column: default_ancestor_column(),
            descendant_column: default_descendant_column(),
            types: Vec::new(),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_type(mut self, relation: RelationTypeConfig) -> Self {
        self.types.push(relation);
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Check the configuration and resolve it into relation types
    pub(crate) fn resolve(&self) -> Result<Vec<RelationType>, ConfigError> {
        if self.types.is_empty() {
            return Err(ConfigError::Empty);
        }

        for ident in [&self.table, &self.ancestor_column, &self.descendant_column] {
            validate_identifier(ident)?;
        }

        let mut names = HashSet::new();
        let mut columns: HashSet<&str> = HashSet::new();
        columns.insert(&self.ancestor_column);
        columns.insert(&self.descendant_column);
        if columns.len() != 2 {
            return Err(ConfigError::DuplicateColumn {
                column: self.ancestor_column.clone(),
            });
        }

        let mut resolved: Vec<RelationType> = Vec::with_capacity(self.types.len());
        for (slot, cfg) in self.types.iter().enumerate() {
            if !names.insert(cfg.name.as_str()) {
                return Err(ConfigError::DuplicateType(cfg.name.clone()));
            }

            let column = cfg.column.as_deref().unwrap_or(&cfg.name);
            validate_identifier(column)?;
            if !columns.insert(column) {
                return Err(ConfigError::DuplicateColumn {
                    column: column.to_string(),
                });
            }

            let cardinality = match &cfg.up {
                UpConfig::Name(_) => Cardinality::Multi,
                UpConfig::Limited { limit: 1, .. } => Cardinality::Single,
                UpConfig::Limited { limit, .. } => {
                    return Err(ConfigError::UnsupportedLimit {
                        relation: cfg.name.clone(),
                        limit: *limit,
                    })
                }
            };

            resolved.push(RelationType {
                name: cfg.name.clone(),
                depth_column: column.to_string(),
                slot,
                cardinality,
                up: cfg.up.name().to_string(),
                down: cfg.down.clone(),
                all_up: cfg.all_up.clone(),
                all_down: cfg.all_down.clone(),
                on_vertex_delete: cfg.on_vertex_delete,
            });
        }

        // View names share one namespace across every type.
        let mut owners: Vec<(String, &str)> = Vec::new();
        for relation in &resolved {
            for (view, _) in relation.views() {
                if let Some((_, first)) = owners.iter().find(|(name, _)| *name == view) {
                    return Err(ConfigError::DuplicateView {
                        name: view,
                        first: first.to_string(),
                        second: relation.name.clone(),
                    });
                }
                owners.push((view, &relation.name));
            }
        }

        Ok(resolved)
    }
}

impl RelationTypeConfig {
    /// A multi-parent type with the given view names
    pub fn multi(
        name: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
        all_up: impl Into<String>,
        all_down: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            column: None,
            up: UpConfig::Name(up.into()),
            down: down.into(),
            all_up: all_up.into(),
            all_down: all_down.into(),
            on_vertex_delete: VertexDeletePolicy::default(),
        }
    }

    /// A single-parent (tree) type with the given view names
    pub fn single(
        name: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
        all_up: impl Into<String>,
        all_down: impl Into<String>,
    ) -> Self {
        let mut cfg = Self::multi(name, "", down, all_up, all_down);
        cfg.up = UpConfig::Limited {
            name: up.into(),
            limit: 1,
        };
        cfg
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_delete_policy(mut self, policy: VertexDeletePolicy) -> Self {
        self.on_vertex_delete = policy;
        self
    }
}

/// Identifiers end up in generated SQL, so only plain names are accepted
fn validate_identifier(ident: &str) -> Result<(), ConfigError> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(ident.to_string()))
    }
}
