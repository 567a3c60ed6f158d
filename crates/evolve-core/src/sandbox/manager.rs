//! Sandbox allocation, release and stale-directory reaping.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::error::{SandboxError, SandboxResult};

/// Directory-name prefix of every sandbox. Also what the reaper matches on.
pub const DEFAULT_SANDBOX_PREFIX: &str = "evolve_sandbox_";

/// Where sandboxes live and when leftovers count as stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Parent directory for sandboxes (system temp dir by default)
    pub root: PathBuf,
    /// Name prefix for sandbox directories
    pub prefix: String,
    /// Age after which `reap` removes a leftover sandbox
    pub stale_after_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
            prefix: DEFAULT_SANDBOX_PREFIX.to_string(),
            stale_after_secs: 24 * 60 * 60,
        }
    }
}

/// Allocates sandboxes under a root directory.
#[derive(Debug, Clone)]
pub struct SandboxManager {
    root: PathBuf,
    prefix: String,
}

impl SandboxManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: DEFAULT_SANDBOX_PREFIX.to_string(),
        }
    }

    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            root: config.root.clone(),
            prefix: config.prefix.clone(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a uniquely-named, empty, writable sandbox directory.
    pub fn acquire(&self) -> SandboxResult<Sandbox> {
        let allocation = |source| SandboxError::Allocation {
            root: self.root.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(allocation)?;
        let dir = tempfile::Builder::new()
            .prefix(&self.prefix)
            .tempdir_in(&self.root)
            .map_err(allocation)?;

        let path = dir.path().to_path_buf();
        debug!(sandbox = %path.display(), "sandbox acquired");
        Ok(Sandbox {
            path,
            dir: Some(dir),
        })
    }

    /// Remove sandbox directories under the root whose modification time is
    /// older than `max_age`. Entries that do not carry the prefix are left
    /// alone.
    pub fn reap_stale(&self, max_age: Duration) -> SandboxResult<ReapReport> {
        let mut report = ReapReport::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(report),
            Err(source) => {
                return Err(SandboxError::Scan {
                    root: self.root.clone(),
                    source,
                })
            }
        };

        let now = SystemTime::now();
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&self.prefix) {
                continue;
            }
            // symlink_metadata: never follow a link planted under the root.
            let Ok(meta) = fs::symlink_metadata(entry.path()) else {
                continue;
            };
            if !meta.is_dir() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < max_age {
                report.kept += 1;
                continue;
            }

            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    info!(sandbox = %path.display(), age_secs = age.as_secs(), "reaped stale sandbox");
                    report.removed.push(path);
                }
                Err(e) => {
                    warn!(sandbox = %path.display(), error = %e, "failed to reap sandbox");
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

/// Outcome of [`SandboxManager::reap_stale`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Sandboxes younger than the cutoff
    pub kept: usize,
}

/// Exclusively-owned staging directory for one run.
///
/// Released exactly once: by [`Sandbox::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct Sandbox {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Sandbox {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Recursively delete the sandbox. Idempotent; a directory that is
    /// already gone is not an error.
    pub fn release(&mut self) -> SandboxResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        match dir.close() {
            Ok(()) => {
                debug!(sandbox = %self.path.display(), "sandbox released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SandboxError::Release {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "sandbox cleanup on drop failed");
        }
    }
}
