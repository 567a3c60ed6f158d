//! Code-Critic: pluggable content rewriter for the evolution pipeline
//!
//! The pipeline only depends on the narrow [`ContentCritic`] contract:
//! `rewrite(content, path_hint) -> Option<text>`. A critic that cannot reach
//! its backend answers `Ok(None)` and the file is skipped; errors are reserved
//! for failures of an individual request (bad status, timeout, garbage body).
//!
//! Use [`select_critic`] once at startup: it checks the configured server once and
//! falls back to [`NoopCritic`] when the server is disabled or unreachable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

mod config;
mod error;
mod ollama;
mod prompt;

pub use config::{CriticConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::CriticError;
pub use ollama::OllamaCritic;
pub use prompt::{build_prompt, strip_code_fences};

/// Result type for critic operations
pub type Result<T> = std::result::Result<T, CriticError>;

/// Rewrites one file's text given its path inside the module.
#[async_trait]
pub trait ContentCritic: Send + Sync {
    /// Short identifier used in logs and run records.
    fn name(&self) -> &str;

    /// Rewrite `content`. `Ok(None)` means "no result" (service unavailable).
    async fn rewrite(&self, content: &str, path_hint: &str) -> Result<Option<String>>;
}

/// Critic used when no rewrite service is available. Never rewrites.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCritic;

#[async_trait]
impl ContentCritic for NoopCritic {
    fn name(&self) -> &str {
        "noop"
    }

    async fn rewrite(&self, _content: &str, _path_hint: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Pick the critic for this process.
///
/// Returns an [`OllamaCritic`] when enabled and the server answers the health check,
/// otherwise a [`NoopCritic`].
pub async fn select_critic(config: &CriticConfig) -> Arc<dyn ContentCritic> {
    if !config.enabled {
        info!("Critic disabled by configuration, using noop critic");
        return Arc::new(NoopCritic);
    }

    let critic = match OllamaCritic::new(config.clone()) {
        Ok(critic) => critic,
        Err(e) => {
            warn!(error = %e, "Critic client setup failed, using noop critic");
            return Arc::new(NoopCritic);
        }
    };

    if critic.is_available().await {
        info!(endpoint = %config.endpoint, model = %config.model, "Critic available");
        Arc::new(critic)
    } else {
        warn!(endpoint = %config.endpoint, "Critic unreachable, using noop critic");
        Arc::new(NoopCritic)
    }
}
