//! Sandbox: ephemeral staging directories for untrusted content.
//!
//! A [`Sandbox`] is a plain filesystem directory owned by exactly one run.
//! Nothing in it is ever executed. It is removed when the run ends, either
//! explicitly through [`Sandbox::release`] or implicitly on `Drop`.
//!
//! # Modules
//!
//! - [`manager`]: `SandboxManager` (acquire, reap), `Sandbox`, `SandboxConfig`
//! - [`error`]: `SandboxError` / `SandboxResult`

pub mod error;
pub mod manager;

pub use error::{SandboxError, SandboxResult};
pub use manager::{ReapReport, Sandbox, SandboxConfig, SandboxManager, DEFAULT_SANDBOX_PREFIX};
