//! Error types for the guard module.
//!
//! Verdicts are values; these errors only describe a guard that cannot be
//! built from its configuration.

/// Errors produced while constructing a [`KernelGuard`](super::KernelGuard).
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("protected path {path:?} is invalid: {reason}")]
    InvalidProtectedPath { path: String, reason: String },

    #[error("protected path set is empty")]
    EmptyProtectedSet,

    #[error("case sensitivity detection failed: {0}")]
    CaseDetection(#[from] std::io::Error),
}

/// Result type for guard construction.
pub type GuardResult<T> = std::result::Result<T, GuardError>;
