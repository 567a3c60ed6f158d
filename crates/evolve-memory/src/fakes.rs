//! In-memory fakes for [`MemoryStore`] (testing only)
//!
//! `InMemoryMemoryStore` satisfies the trait contract without any external
//! dependencies; `UnavailableMemoryStore` fails every call.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::record::{MemoryId, MemoryRecord};
use crate::store::MemoryStore;
use crate::MemoryResult;

/// In-memory store backed by a `Vec<MemoryRecord>` in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    records: Mutex<Vec<MemoryRecord>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, oldest first.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn remember(
        &self,
        content: &str,
        metadata: serde_json::Value,
    ) -> MemoryResult<MemoryId> {
        let id = MemoryId(format!("memories:{}", uuid::Uuid::new_v4().simple()));
        let record = MemoryRecord::new(id.clone(), content, metadata);
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(record);
        Ok(id)
    }

    async fn recall(&self, kind: &str, limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.kind.as_deref() == Some(kind))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Store whose every call fails with [`MemoryError::Unavailable`].
#[derive(Debug, Default)]
pub struct UnavailableMemoryStore;

#[async_trait]
impl MemoryStore for UnavailableMemoryStore {
    async fn remember(
        &self,
        _content: &str,
        _metadata: serde_json::Value,
    ) -> MemoryResult<MemoryId> {
        Err(MemoryError::Unavailable("memory store offline".into()))
    }

    async fn recall(&self, _kind: &str, _limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        Err(MemoryError::Unavailable("memory store offline".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_remember_then_recall_newest_first() {
        let store = InMemoryMemoryStore::new();
        store
            .remember("first", json!({"type": "evolution_event"}))
            .await
            .unwrap();
        store.remember("other", json!({"type": "preference"})).await.unwrap();
        store
            .remember("second", json!({"type": "evolution_event"}))
            .await
            .unwrap();

        let events = store.recall("evolution_event", 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "second");
        assert_eq!(events[1].content, "first");
    }

    #[tokio::test]
    async fn test_recall_respects_limit() {
        let store = InMemoryMemoryStore::new();
        for i in 0..5 {
            store
                .remember(&format!("event {i}"), json!({"type": "evolution_event"}))
                .await
                .unwrap();
        }
        assert_eq!(store.recall("evolution_event", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = UnavailableMemoryStore;
        let err = store.remember("x", json!({})).await.unwrap_err();
        assert!(matches!(err, MemoryError::Unavailable(_)));
    }
}
