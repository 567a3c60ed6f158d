//! Fetcher: materialize a source locator into a sandbox directory.
//!
//! Archive locators are downloaded over HTTP and extracted; repository
//! locators are cloned with an external VCS tool. Both are bounded by a
//! timeout and report failure as a [`FetchError`] value, never a panic.

pub mod archive;
pub mod clone;
pub mod error;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::request::SourceLocator;

pub use archive::extract_zip;
pub use error::{FetchError, FetchResult};

/// Fetch timeouts, limits and tool selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Archive download budget in seconds
    pub archive_timeout_secs: u64,
    /// Clone budget in seconds
    pub clone_timeout_secs: u64,
    /// VCS program used for repository locators
    pub git_program: String,
    /// Pass `--depth 1` to the clone
    pub shallow_clone: bool,
    /// Largest archive body accepted
    pub max_archive_bytes: u64,
    /// Largest total size an archive may expand to
    pub max_extracted_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            archive_timeout_secs: 30,
            clone_timeout_secs: 60,
            git_program: "git".to_string(),
            shallow_clone: true,
            max_archive_bytes: 256 * 1024 * 1024,
            max_extracted_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// How content was materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FetchReport {
    Archive { bytes: u64, entries: usize },
    Clone,
}

impl FetchReport {
    /// One-line description for the run record.
    pub fn describe(&self) -> String {
        match self {
            FetchReport::Archive { bytes, entries } => {
                format!("downloaded {bytes} bytes, extracted {entries} entries")
            }
            FetchReport::Clone => "repository cloned".to_string(),
        }
    }
}

/// Materializes remote content into a destination directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, locator: &SourceLocator, dest: &Path) -> FetchResult<FetchReport>;
}

/// Fetcher backed by `reqwest` for archives and the VCS tool for clones.
pub struct NetworkFetcher {
    config: FetchConfig,
    http_client: reqwest::Client,
}

impl NetworkFetcher {
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("evolve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::ClientSetup(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for NetworkFetcher {
    async fn fetch(&self, locator: &SourceLocator, dest: &Path) -> FetchResult<FetchReport> {
        match locator {
            SourceLocator::Archive { url } => {
                let bytes = archive::download(
                    &self.http_client,
                    url,
                    self.config.archive_timeout_secs,
                    self.config.max_archive_bytes,
                )
                .await?;
                let size = bytes.len() as u64;
                let dest = dest.to_path_buf();
                let limit = self.config.max_extracted_bytes;
                let entries = tokio::task::spawn_blocking(move || extract_zip(&bytes, &dest, limit))
                    .await
                    .map_err(|e| FetchError::Archive(format!("extraction task failed: {e}")))??;
                Ok(FetchReport::Archive {
                    bytes: size,
                    entries,
                })
            }
            SourceLocator::Repository { url } => {
                clone::clone_repository(
                    &self.config.git_program,
                    url,
                    dest,
                    self.config.clone_timeout_secs,
                    self.config.shallow_clone,
                )
                .await?;
                Ok(FetchReport::Clone)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let cfg = FetchConfig::default();
        assert_eq!(cfg.archive_timeout_secs, 30);
        assert_eq!(cfg.clone_timeout_secs, 60);
        assert_eq!(cfg.git_program, "git");
    }

    #[test]
    fn test_report_describe() {
        let report = FetchReport::Archive {
            bytes: 10,
            entries: 2,
        };
        assert_eq!(report.describe(), "downloaded 10 bytes, extracted 2 entries");
        assert_eq!(FetchReport::Clone.describe(), "repository cloned");
    }
}
