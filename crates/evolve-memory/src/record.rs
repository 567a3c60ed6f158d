//! Memory record schema

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata key whose string value classifies a record (e.g. `"evolution_event"`).
pub const KIND_KEY: &str = "type";

/// Backend-assigned identifier of a stored memory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub String);

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A durable memory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Identifier assigned by the store
    pub id: MemoryId,
    /// Free-text content
    pub content: String,
    /// Classification copied from `metadata[KIND_KEY]`, if present
    pub kind: Option<String>,
    /// Arbitrary metadata supplied by the caller
    pub metadata: serde_json::Value,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Build a record, deriving `kind` from the metadata.
    pub fn new(id: MemoryId, content: &str, metadata: serde_json::Value) -> Self {
        MemoryRecord {
            id,
            content: content.to_string(),
            kind: kind_of(&metadata),
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Extract the record kind from caller metadata.
pub(crate) fn kind_of(metadata: &serde_json::Value) -> Option<String> {
    metadata
        .get(KIND_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_derived_from_metadata() {
        let rec = MemoryRecord::new(
            MemoryId("m-1".into()),
            "installed weather",
            json!({"type": "evolution_event", "module": "weather"}),
        );
        assert_eq!(rec.kind.as_deref(), Some("evolution_event"));
    }

    #[test]
    fn test_kind_absent_when_not_a_string() {
        let rec = MemoryRecord::new(MemoryId("m-2".into()), "x", json!({"type": 7}));
        assert!(rec.kind.is_none());
        let rec = MemoryRecord::new(MemoryId("m-3".into()), "x", json!({}));
        assert!(rec.kind.is_none());
    }

    #[test]
    fn test_memory_id_serializes_transparently() {
        let id = MemoryId("memories:abc".into());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"memories:abc\"");
    }
}
