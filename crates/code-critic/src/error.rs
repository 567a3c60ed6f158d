//! Error types for code-critic

use thiserror::Error;

/// Errors a critic can report for a single rewrite request.
///
/// Unreachability is *not* an error: critics report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum CriticError {
    /// The endpoint answered with a non-success status
    #[error("critic returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request exceeded its per-file time budget
    #[error("critic request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Transport failure after the connection was established
    #[error("critic transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("critic response malformed: {0}")]
    MalformedResponse(String),

    /// The HTTP client could not be constructed
    #[error("critic client setup failed: {0}")]
    ClientSetup(String),
}

impl From<serde_json::Error> for CriticError {
    fn from(err: serde_json::Error) -> Self {
        CriticError::MalformedResponse(err.to_string())
    }
}
