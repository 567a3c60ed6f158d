//! SurrealDB-backed memory store
//!
//! Supports any engine reachable through `surrealdb::engine::any`:
//! `mem://` (tests, ephemeral), `surrealkv://<path>` (local durable file),
//! and `ws://` / `wss://` (remote server).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::{Datetime as SurrealDatetime, Thing};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::MemoryError;
use crate::record::{kind_of, MemoryId, MemoryRecord};
use crate::store::MemoryStore;
use crate::MemoryResult;

const NAMESPACE: &str = "evolve";
const DATABASE: &str = "memory";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbMemoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    content: String,
    kind: Option<String>,
    metadata: serde_json::Value,
    created_at: SurrealDatetime,
}

impl DbMemoryRecord {
    fn into_record(self) -> MemoryResult<MemoryRecord> {
        let id = self.id.ok_or(MemoryError::NotAcknowledged)?;
        Ok(MemoryRecord {
            id: MemoryId(id.to_string()),
            content: self.content,
            kind: self.kind,
            metadata: self.metadata,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

/// SurrealDB connection wrapper implementing [`MemoryStore`]
#[derive(Clone)]
pub struct SurrealMemoryStore {
    db: Surreal<Any>,
}

impl SurrealMemoryStore {
    /// Connect to an ephemeral in-memory database.
    pub async fn in_memory() -> MemoryResult<Self> {
        Self::connect("mem://").await
    }

    /// Connect to the database at `url` and set up the schema.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect(url: &str) -> MemoryResult<Self> {
        info!("Connecting to memory backend");

        if let Some(path) = url.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(path).map_err(|e| {
                MemoryError::Connection(format!("failed to create database directory {path}: {e}"))
            })?;
        }

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| MemoryError::Connection(format!("failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| MemoryError::Connection(e.to_string()))?;

        let store = SurrealMemoryStore { db };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> MemoryResult<()> {
        let schema = r#"
            DEFINE TABLE IF NOT EXISTS memories SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS idx_memory_kind ON memories FIELDS kind;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| MemoryError::Query(format!("schema setup failed: {e}")))?;

        debug!("Memory schema initialized");
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for SurrealMemoryStore {
    #[instrument(skip(self, content, metadata))]
    async fn remember(
        &self,
        content: &str,
        metadata: serde_json::Value,
    ) -> MemoryResult<MemoryId> {
        let record = DbMemoryRecord {
            id: None,
            content: content.to_string(),
            kind: kind_of(&metadata),
            metadata,
            created_at: SurrealDatetime::from(Utc::now()),
        };

        let created: Option<DbMemoryRecord> = self.db.create("memories").content(record).await?;
        let created = created.ok_or(MemoryError::NotAcknowledged)?.into_record()?;

        debug!(id = %created.id, "Memory stored");
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn recall(&self, kind: &str, limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        let kind_owned = kind.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut result = self
            .db
            .query("SELECT * FROM memories WHERE kind = $kind ORDER BY created_at DESC LIMIT $limit")
            .bind(("kind", kind_owned))
            .bind(("limit", limit))
            .await?;

        let rows: Vec<DbMemoryRecord> = result.take(0)?;
        rows.into_iter().map(DbMemoryRecord::into_record).collect()
    }
}
