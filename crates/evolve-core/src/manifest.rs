//! File manifests: the candidate paths discovered in a sandbox.
//!
//! A manifest is built fresh each time it is needed and never cached across
//! stages. Directories are walked without following symlinks; every
//! non-directory entry is listed with its kind so the guard can reject
//! anything that is not a regular file.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// What kind of filesystem object a manifest entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Symlink,
    /// Sockets, FIFOs, devices.
    Other,
}

/// One candidate path, relative to the scanned root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl ManifestEntry {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }
}

/// Directories left out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestFilter {
    /// Skip directories whose name starts with `.`
    pub skip_hidden_dirs: bool,
    /// Directory names skipped at any depth
    pub excluded_dirs: Vec<String>,
}

impl Default for ManifestFilter {
    fn default() -> Self {
        Self {
            skip_hidden_dirs: true,
            excluded_dirs: ["__pycache__", "node_modules", "target", "tests", "docs"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ManifestFilter {
    /// A filter that keeps everything.
    pub fn none() -> Self {
        Self {
            skip_hidden_dirs: false,
            excluded_dirs: Vec::new(),
        }
    }

    fn excludes_dir(&self, name: &str) -> bool {
        (self.skip_hidden_dirs && name.starts_with('.'))
            || self.excluded_dirs.iter().any(|d| d == name)
    }
}

/// Ordered list of candidate paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    entries: Vec<ManifestEntry>,
}

impl FileManifest {
    /// Walk `root` and list every non-directory entry, sorted by path.
    pub fn scan(root: &Path, filter: &ManifestFilter) -> io::Result<Self> {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir() && filter.excludes_dir(&e.file_name().to_string_lossy()))
            });

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                EntryKind::Other
            };
            let path = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .to_path_buf();
            entries.push(ManifestEntry { path, kind });
        }

        Ok(Self { entries })
    }

    /// Manifest of regular files at the given relative paths.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: paths.into_iter().map(ManifestEntry::file).collect(),
        }
    }

    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Regular-file entries only.
    pub fn files(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::File)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_scan_lists_files_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "tool/main.src");
        touch(dir.path(), "readme.txt");
        touch(dir.path(), "a/b/c.txt");

        let manifest = FileManifest::scan(dir.path(), &ManifestFilter::default()).unwrap();
        let paths: Vec<_> = manifest.paths().map(|p| p.to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a/b/c.txt"),
                PathBuf::from("readme.txt"),
                PathBuf::from("tool/main.src"),
            ]
        );
        assert!(manifest.entries().iter().all(|e| e.kind == EntryKind::File));
    }

    #[test]
    fn test_scan_skips_hidden_and_excluded_dirs_but_keeps_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".git/config");
        touch(dir.path(), "__pycache__/x.pyc");
        touch(dir.path(), "tests/test_x.py");
        touch(dir.path(), "docs/index.md");
        touch(dir.path(), ".env");
        touch(dir.path(), "main.py");

        let manifest = FileManifest::scan(dir.path(), &ManifestFilter::default()).unwrap();
        let paths: Vec<_> = manifest.paths().map(|p| p.to_path_buf()).collect();
        assert_eq!(paths, vec![PathBuf::from(".env"), PathBuf::from("main.py")]);
    }

    #[test]
    fn test_scan_without_filter_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), ".git/HEAD");
        touch(dir.path(), "main.py");

        let manifest = FileManifest::scan(dir.path(), &ManifestFilter::none()).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_scan_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = FileManifest::scan(dir.path(), &ManifestFilter::default()).unwrap();
        assert!(manifest.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_reports_symlinks_without_following() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "secret.txt");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let manifest = FileManifest::scan(dir.path(), &ManifestFilter::default()).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.entries()[0].path, PathBuf::from("escape"));
        assert_eq!(manifest.entries()[0].kind, EntryKind::Symlink);
        assert_eq!(manifest.files().count(), 0);
    }

    #[test]
    fn test_from_paths_builds_file_entries() {
        let manifest = FileManifest::from_paths(["readme.txt", "tool/main.src"]);
        assert_eq!(manifest.files().count(), 2);
    }
}
