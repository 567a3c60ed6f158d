//! Evolve-Memory: long-term memory collaborator for the evolution pipeline
//!
//! The pipeline only ever *appends* to memory: a successful evolution run
//! records one "evolution event" and carries the returned [`MemoryId`] in its
//! run record. Read-back (`recall`) exists for operators and tests.
//!
//! ## Key Components
//!
//! - [`MemoryStore`]: backend-agnostic async trait (`remember` / `recall`)
//! - [`SurrealMemoryStore`]: SurrealDB-backed store (`mem://`, `surrealkv://`, `ws://`)
//! - [`OfflineMemoryStore`]: failing stand-in when the backend is unreachable
//! - [`fakes::InMemoryMemoryStore`]: dependency-free store for tests

mod error;
pub mod fakes;
mod record;
mod store;
mod surreal;

pub use error::MemoryError;
pub use record::{MemoryId, MemoryRecord, KIND_KEY};
pub use store::{MemoryStore, OfflineMemoryStore};
pub use surreal::SurrealMemoryStore;

/// Result type for memory operations
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
