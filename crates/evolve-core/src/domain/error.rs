//! Error taxonomy for the evolution pipeline.

use crate::domain::result::EvolutionState;
use crate::fetch::FetchError;
use crate::guard::GuardError;
use crate::install::InstallError;
use crate::sandbox::SandboxError;

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolveError {
    #[error("invalid module name {name:?}: {reason}")]
    InvalidModuleName { name: String, reason: String },

    #[error("invalid source locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to build manifest: {0}")]
    Manifest(#[source] std::io::Error),

    #[error("security violation: {count} offending path(s): {paths}")]
    SecurityViolation { count: usize, paths: String },

    #[error("guard configuration error: {0}")]
    Guard(#[from] GuardError),

    #[error("installation failed: {0}")]
    Install(#[from] InstallError),

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: EvolutionState,
        to: EvolutionState,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("memory error: {0}")]
    Memory(#[from] evolve_memory::MemoryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, EvolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_violation_display_lists_paths() {
        let err = EvolveError::SecurityViolation {
            count: 2,
            paths: "../core/secrets.cfg, .env".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("security violation"));
        assert!(msg.contains("../core/secrets.cfg"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = EvolveError::InvalidTransition {
            from: EvolutionState::Succeeded,
            to: EvolutionState::Installing,
        };
        assert!(err.to_string().contains("Succeeded"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: EvolveError = io.into();
        assert!(err.to_string().contains("read-only"));
    }
}
