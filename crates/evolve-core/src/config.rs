//! Pipeline configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! environment variables. Every field has a default, so an empty file (or
//! none at all) is a valid configuration.
//!
//! ```toml
//! [install]
//! modules_root = "modules"
//! mode = "staged"
//!
//! [guard.protected]
//! roots = ["core"]
//! names = [".env", ".git"]
//!
//! [critic]
//! endpoint = "http://localhost:11434"
//! model = "llama3.1"
//! ```

use std::path::{Path, PathBuf};

use code_critic::CriticConfig;
use serde::{Deserialize, Serialize};

use crate::domain::error::{EvolveError, Result};
use crate::fetch::FetchConfig;
use crate::guard::GuardConfig;
use crate::install::InstallConfig;
use crate::manifest::ManifestFilter;
use crate::personalize::PersonalizeOptions;
use crate::sandbox::SandboxConfig;

pub const ENV_MODULES_DIR: &str = "EVOLVE_MODULES_DIR";
pub const ENV_SANDBOX_DIR: &str = "EVOLVE_SANDBOX_DIR";
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
pub const ENV_CRITIC_MODEL: &str = "EVOLVE_CRITIC_MODEL";
pub const ENV_MEMORY_URL: &str = "EVOLVE_MEMORY_URL";

/// Local database used when no memory endpoint is configured.
pub const DEFAULT_MEMORY_URL: &str = "surrealkv://.evolve/db";

/// Memory collaborator section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// SurrealDB endpoint: `surrealkv://<path>` (durable, default),
    /// `ws://host:port`, or `mem://` (process-local)
    pub url: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_MEMORY_URL.to_string(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolveConfig {
    pub sandbox: SandboxConfig,
    pub fetch: FetchConfig,
    pub manifest: ManifestFilter,
    pub guard: GuardConfig,
    pub critic: CriticConfig,
    pub personalize: PersonalizeOptions,
    pub install: InstallConfig,
    pub memory: MemoryConfig,
}

impl EvolveConfig {
    /// Defaults, overlaid with `path` (if given), overlaid with the
    /// environment. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    EvolveError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EvolveError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EvolveError::Config(e.to_string()))
    }

    /// Overlay process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay variables from `lookup`; blank values are ignored.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_MODULES_DIR) {
            self.install.modules_root = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_SANDBOX_DIR) {
            self.sandbox.root = PathBuf::from(dir);
        }
        if let Some(host) = get(ENV_OLLAMA_HOST) {
            self.critic.endpoint = host;
        }
        if let Some(model) = get(ENV_CRITIC_MODEL) {
            self.critic.model = model;
        }
        if let Some(url) = get(ENV_MEMORY_URL) {
            self.memory.url = url;
        }
    }

    /// Reject values that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(EvolveError::Config(msg.to_string()));

        if self.fetch.archive_timeout_secs == 0 || self.fetch.clone_timeout_secs == 0 {
            return fail("fetch timeouts must be greater than zero");
        }
        if self.fetch.max_archive_bytes == 0 {
            return fail("fetch.max_archive_bytes must be greater than zero");
        }
        if self.fetch.git_program.trim().is_empty() {
            return fail("fetch.git_program must not be empty");
        }
        if self.critic.timeout_secs == 0 || self.critic.health_timeout_secs == 0 {
            return fail("critic timeouts must be greater than zero");
        }
        if self.guard.protected.is_empty() {
            return fail("guard.protected must name at least one root or name");
        }
        if self.sandbox.prefix.is_empty() {
            return fail("sandbox.prefix must not be empty");
        }
        if self.install.modules_root.as_os_str().is_empty() {
            return fail("install.modules_root must not be empty");
        }
        Ok(())
    }
}
