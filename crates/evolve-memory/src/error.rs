//! Error types for evolve-memory

use thiserror::Error;

/// Errors that can occur while talking to the memory backend
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Database connection error
    #[error("memory backend connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("memory query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("memory serialization failed: {0}")]
    Serialization(String),

    /// The backend accepted the write but returned nothing
    #[error("memory write was not acknowledged")]
    NotAcknowledged,

    /// The backend could not be reached
    #[error("memory backend unavailable: {0}")]
    Unavailable(String),
}

impl From<surrealdb::Error> for MemoryError {
    fn from(err: surrealdb::Error) -> Self {
        MemoryError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}
