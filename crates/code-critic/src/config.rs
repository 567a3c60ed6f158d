//! Critic configuration

use serde::{Deserialize, Serialize};

/// Default inference endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
/// Default model used for rewrites.
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Critic configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticConfig {
    /// When false the pipeline always uses the no-op critic
    pub enabled: bool,
    /// Base URL of the Ollama-compatible server
    pub endpoint: String,
    /// Model name passed to `/api/generate`
    pub model: String,
    /// Per-file rewrite budget in seconds
    pub timeout_secs: u64,
    /// Budget for the startup health check in seconds
    pub health_timeout_secs: u64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        CriticConfig {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            health_timeout_secs: 5,
        }
    }
}

impl CriticConfig {
    /// Defaults overlaid with `OLLAMA_HOST` and `EVOLVE_CRITIC_MODEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                self.endpoint = host;
            }
        }
        if let Ok(model) = std::env::var("EVOLVE_CRITIC_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
    }

    /// Create config for a specific endpoint
    pub fn new(endpoint: &str, model: &str) -> Self {
        CriticConfig {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            ..Self::default()
        }
    }

    /// Override the per-file timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Endpoint URL with any trailing slash removed.
    pub(crate) fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CriticConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.model, "llama3.1");
        assert_eq!(cfg.timeout_secs, 120);
        assert_eq!(cfg.health_timeout_secs, 5);
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let cfg = CriticConfig::new("http://critic:11434/", "m");
        assert_eq!(cfg.base_url(), "http://critic:11434");
    }

    #[test]
    fn test_partial_toml_like_json_uses_defaults() {
        let cfg: CriticConfig = serde_json::from_str(r#"{"model": "qwen2.5-coder"}"#).unwrap();
        assert_eq!(cfg.model, "qwen2.5-coder");
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
    }
}
