//! Installer: copy verified sandbox content into `modules/<name>/`.
//!
//! Only regular files listed in the verified manifest are copied, so nothing
//! the guard did not see can reach the module tree. Top-level directories
//! present in the manifest replace their installed counterparts wholesale.
//! Files keep their permissions and timestamps.
//!
//! Two modes:
//! - [`InstallMode::InPlace`] writes straight into the target. An I/O error
//!   mid-copy can leave a partially updated module.
//! - [`InstallMode::Staged`] builds the new tree in a sibling staging
//!   directory and renames it into place; the previous tree is kept once as
//!   `.<name>.previous`.

use std::collections::BTreeSet;
use std::fs::{self, File, FileTimes};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::domain::request::ModuleName;
use crate::manifest::{EntryKind, FileManifest};

/// Errors produced while installing a module.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to install {}: {reason}", path.display())]
    UnsafeEntry { path: PathBuf, reason: String },
}

/// Result type for install operations.
pub type InstallResult<T> = std::result::Result<T, InstallError>;

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> InstallError + 'a {
    move |source| InstallError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    #[default]
    InPlace,
    Staged,
}

/// Installer configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Directory holding installed modules
    pub modules_root: PathBuf,
    pub mode: InstallMode,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            modules_root: PathBuf::from("modules"),
            mode: InstallMode::InPlace,
        }
    }
}

/// What an install wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    pub target: PathBuf,
    pub mode: InstallMode,
    pub files_installed: usize,
    /// SHA-256 over (path, content) of every installed file in manifest order
    pub digest: String,
    /// Top-level directories replaced wholesale
    pub replaced_dirs: Vec<String>,
    /// Previous tree kept by a staged install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PathBuf>,
}

/// Copies verified content into the modules root.
#[derive(Debug, Clone)]
pub struct Installer {
    modules_root: PathBuf,
    mode: InstallMode,
}

impl Installer {
    pub fn new(modules_root: impl Into<PathBuf>) -> Self {
        Self {
            modules_root: modules_root.into(),
            mode: InstallMode::InPlace,
        }
    }

    pub fn from_config(config: &InstallConfig) -> Self {
        Self {
            modules_root: config.modules_root.clone(),
            mode: config.mode,
        }
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn modules_root(&self) -> &Path {
        &self.modules_root
    }

    pub fn mode(&self) -> InstallMode {
        self.mode
    }

    /// Destination directory for `module`.
    pub fn target_for(&self, module: &ModuleName) -> PathBuf {
        self.modules_root.join(module.as_str())
    }

    /// Install the files of `manifest` from `source_root` as `module`.
    pub fn install(
        &self,
        source_root: &Path,
        module: &ModuleName,
        manifest: &FileManifest,
    ) -> InstallResult<InstallReport> {
        let files = checked_files(manifest)?;
        let target = self.target_for(module);
        fs::create_dir_all(&self.modules_root)
            .map_err(io_err("create modules root", &self.modules_root))?;

        let report = match self.mode {
            InstallMode::InPlace => install_in_place(source_root, &target, &files)?,
            InstallMode::Staged => {
                install_staged(source_root, &self.modules_root, module, &target, &files)?
            }
        };

        info!(
            module = %module,
            target = %report.target.display(),
            files = report.files_installed,
            mode = ?report.mode,
            "module installed"
        );
        Ok(report)
    }
}

/// Regular-file paths of the manifest, refusing anything that could leave
/// the target. The guard has already rejected these; this is the last line.
fn checked_files(manifest: &FileManifest) -> InstallResult<Vec<&Path>> {
    let mut files = Vec::new();
    for entry in manifest.entries() {
        if entry.kind != EntryKind::File {
            return Err(InstallError::UnsafeEntry {
                path: entry.path.clone(),
                reason: "not a regular file".to_string(),
            });
        }
        if !entry
            .path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(InstallError::UnsafeEntry {
                path: entry.path.clone(),
                reason: "not a plain relative path".to_string(),
            });
        }
        files.push(entry.path.as_path());
    }
    Ok(files)
}

/// First segment of every multi-segment path.
fn top_level_dirs(files: &[&Path]) -> BTreeSet<String> {
    files
        .iter()
        .filter_map(|path| {
            let mut normal = path.components().filter_map(|c| match c {
                Component::Normal(s) => Some(s),
                _ => None,
            });
            let first = normal.next()?;
            normal.next()?;
            Some(first.to_string_lossy().into_owned())
        })
        .collect()
}

fn install_in_place(source_root: &Path, target: &Path, files: &[&Path]) -> InstallResult<InstallReport> {
    fs::create_dir_all(target).map_err(io_err("create", target))?;

    let replaced = top_level_dirs(files);
    for dir in &replaced {
        remove_any(&target.join(dir))?;
    }

    let digest = copy_files(source_root, target, files)?;
    Ok(InstallReport {
        target: target.to_path_buf(),
        mode: InstallMode::InPlace,
        files_installed: files.len(),
        digest,
        replaced_dirs: replaced.into_iter().collect(),
        previous: None,
    })
}

fn install_staged(
    source_root: &Path,
    modules_root: &Path,
    module: &ModuleName,
    target: &Path,
    files: &[&Path],
) -> InstallResult<InstallReport> {
    let staging = modules_root.join(format!(
        ".{module}.staging-{}",
        uuid::Uuid::new_v4().simple()
    ));
    fs::create_dir(&staging).map_err(io_err("create", &staging))?;

    let digest = match copy_files(source_root, &staging, files) {
        Ok(digest) => digest,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    let previous = modules_root.join(format!(".{module}.previous"));
    let had_previous = fs::symlink_metadata(target).is_ok();
    if had_previous {
        let moved = remove_any(&previous)
            .and_then(|()| fs::rename(target, &previous).map_err(io_err("move aside", target)));
        if let Err(e) = moved {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    }

    if let Err(source) = fs::rename(&staging, target) {
        if had_previous {
            if let Err(e) = fs::rename(&previous, target) {
                warn!(target = %target.display(), error = %e, "failed to restore previous module tree");
            }
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(InstallError::Io {
            op: "move into place",
            path: target.to_path_buf(),
            source,
        });
    }

    Ok(InstallReport {
        target: target.to_path_buf(),
        mode: InstallMode::Staged,
        files_installed: files.len(),
        digest,
        replaced_dirs: Vec::new(),
        previous: had_previous.then_some(previous),
    })
}

/// Copy each file under `dest`, returning the content digest.
fn copy_files(source_root: &Path, dest: &Path, files: &[&Path]) -> InstallResult<String> {
    let mut hasher = Sha256::new();
    for rel in files {
        let from = source_root.join(rel);
        let to = dest.join(rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(io_err("create", parent))?;
        }
        // Never write through a link that already sits in the module tree.
        if fs::symlink_metadata(&to).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(&to).map_err(io_err("remove", &to))?;
        }
        copy_preserving(&from, &to)?;
        hash_file(&mut hasher, rel, &to)?;
        debug!(file = %rel.display(), "installed");
    }
    Ok(hex::encode(hasher.finalize()))
}

fn copy_preserving(from: &Path, to: &Path) -> InstallResult<()> {
    fs::copy(from, to).map_err(io_err("copy", from))?;

    let meta = fs::metadata(from).map_err(io_err("stat", from))?;
    let mut times = FileTimes::new();
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    // Timestamps are best effort; content and permissions are already in place.
    if let Err(e) = File::open(to).and_then(|f| f.set_times(times)) {
        debug!(file = %to.display(), error = %e, "could not preserve timestamps");
    }
    Ok(())
}

fn hash_file(hasher: &mut Sha256, rel: &Path, path: &Path) -> InstallResult<()> {
    hasher.update(rel.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    let mut file = File::open(path).map_err(io_err("read", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(io_err("read", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    hasher.update([0u8]);
    Ok(())
}

fn remove_any(path: &Path) -> InstallResult<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(io_err("remove", path)),
        Ok(_) => fs::remove_file(path).map_err(io_err("remove", path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err("stat", path)(e)),
    }
}
