//! Ollama-backed critic
//!
//! Talks to an Ollama-compatible server: `GET /api/tags` for the
//! health check and `POST /api/generate` (non-streaming) per file.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CriticConfig;
use crate::error::CriticError;
use crate::prompt::{build_prompt, strip_code_fences};
use crate::{ContentCritic, Result};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Critic client for an Ollama server
pub struct OllamaCritic {
    config: CriticConfig,
    http_client: reqwest::Client,
}

impl OllamaCritic {
    /// Create a new critic client
    pub fn new(config: CriticConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("code-critic/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CriticError::ClientSetup(e.to_string()))?;

        Ok(OllamaCritic {
            config,
            http_client,
        })
    }

    /// Check whether the server answers `/api/tags` within the health-check budget.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url());
        match self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "critic health check failed");
                false
            }
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &CriticConfig {
        &self.config
    }
}

#[async_trait]
impl ContentCritic for OllamaCritic {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn rewrite(&self, content: &str, path_hint: &str) -> Result<Option<String>> {
        let url = format!("{}/api/generate", self.config.base_url());
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: build_prompt(content, path_hint),
            stream: false,
        };

        let response = match self
            .http_client
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                warn!(path = %path_hint, error = %e, "critic unreachable, skipping file");
                return Ok(None);
            }
            Err(e) if e.is_timeout() => {
                return Err(CriticError::Timeout {
                    secs: self.config.timeout_secs,
                })
            }
            Err(e) => return Err(CriticError::Transport(e.to_string())),
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CriticError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(CriticError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        let rewritten = strip_code_fences(&parsed.response);
        if rewritten.is_empty() {
            debug!(path = %path_hint, "critic returned an empty rewrite");
            return Ok(None);
        }

        Ok(Some(rewritten))
    }
}
