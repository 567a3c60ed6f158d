//! Error types for the fetch module.

/// Errors produced while materializing remote content.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("archive exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("archive expands beyond {limit} bytes")]
    ExtractedTooLarge { limit: u64 },

    #[error("invalid archive: {0}")]
    Archive(String),

    #[error("archive entry {name:?} would be written outside the destination")]
    UnsafeArchiveEntry { name: String },

    #[error("{program} is not installed or not on PATH")]
    ToolMissing { program: String },

    #[error("clone failed (exit code {code:?}): {stderr}")]
    CloneFailed { code: Option<i32>, stderr: String },

    #[error("http client setup failed: {0}")]
    ClientSetup(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for FetchError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => FetchError::Io(e),
            other => FetchError::Archive(other.to_string()),
        }
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
