//! Memory store trait

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::record::{MemoryId, MemoryRecord};
use crate::MemoryResult;

/// Long-term memory collaborator.
///
/// Guarantees:
/// - `remember` appends; it never overwrites an existing record.
/// - `recall` returns records of the given kind, newest first.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append a durable record and return its identifier.
    async fn remember(&self, content: &str, metadata: serde_json::Value)
        -> MemoryResult<MemoryId>;

    /// Return up to `limit` records whose kind equals `kind`, newest first.
    async fn recall(&self, kind: &str, limit: usize) -> MemoryResult<Vec<MemoryRecord>>;
}

/// Stand-in for a backend that could not be reached at startup.
///
/// Every call fails with [`MemoryError::Unavailable`] carrying the original
/// reason, so callers that treat memory as best-effort keep working.
#[derive(Debug, Clone)]
pub struct OfflineMemoryStore {
    reason: String,
}

impl OfflineMemoryStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl MemoryStore for OfflineMemoryStore {
    async fn remember(
        &self,
        _content: &str,
        _metadata: serde_json::Value,
    ) -> MemoryResult<MemoryId> {
        Err(MemoryError::Unavailable(self.reason.clone()))
    }

    async fn recall(&self, _kind: &str, _limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        Err(MemoryError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_store_reports_reason() {
        let store = OfflineMemoryStore::new("connection refused");
        let err = store
            .remember("x", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Unavailable(ref r) if r == "connection refused"));
        assert!(store.recall("evolution_event", 1).await.is_err());
    }
}
