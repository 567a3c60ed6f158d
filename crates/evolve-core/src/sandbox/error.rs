//! Error types for the sandbox module.

use std::path::PathBuf;

/// Errors produced by the sandbox layer.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("cannot allocate sandbox under {}: {source}", root.display())]
    Allocation {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot remove sandbox {}: {source}", path.display())]
    Release {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot scan sandbox root {}: {source}", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
