//! Vertex identifiers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a vertex participating in one or more hierarchies.
///
/// The engine never owns vertices; it only stores their identifiers in
/// closure rows. Identifiers are compared and ordered as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(String);

impl VertexId {
    /// Create a new random VertexId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a VertexId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }

    /// Wrap an existing host identifier
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VertexId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VertexId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VertexId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_id_serializes_as_string() {
        let id = VertexId::from_string("dept:engineering");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"dept:engineering\"");

        let back: VertexId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn random_ids_are_distinct() {
        assert_ne!(VertexId::new(), VertexId::new());
    }
}
