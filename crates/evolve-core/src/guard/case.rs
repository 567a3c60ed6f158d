//! Case sensitivity of the install target filesystem.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Whether path comparisons must fold case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    #[default]
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// Inspect the filesystem holding `dir` (or its nearest existing ancestor)
    /// by creating a lowercase-named file and looking it up in uppercase.
    pub fn detect(dir: &Path) -> io::Result<Self> {
        let parent = dir
            .ancestors()
            .find(|p| !p.as_os_str().is_empty() && p.is_dir())
            .unwrap_or(Path::new("."));

        let marker = tempfile::Builder::new()
            .prefix(".evolve-case-check-")
            .tempfile_in(parent)?;
        let name = marker
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().to_uppercase())
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "marker file has no name"))?;

        if parent.join(name).exists() {
            Ok(CaseSensitivity::Insensitive)
        } else {
            Ok(CaseSensitivity::Sensitive)
        }
    }

    /// Fold `s` for comparison under this mode.
    pub(crate) fn fold(self, s: &str) -> String {
        match self {
            CaseSensitivity::Sensitive => s.to_string(),
            CaseSensitivity::Insensitive => s.to_lowercase(),
        }
    }
}

/// How the guard chooses its case mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseMode {
    /// Detect from the modules root at startup.
    #[default]
    Auto,
    Sensitive,
    Insensitive,
}

impl CaseMode {
    pub fn resolve(self, modules_root: &Path) -> io::Result<CaseSensitivity> {
        match self {
            CaseMode::Auto => CaseSensitivity::detect(modules_root),
            CaseMode::Sensitive => Ok(CaseSensitivity::Sensitive),
            CaseMode::Insensitive => Ok(CaseSensitivity::Insensitive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_returns_a_mode_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mode = CaseSensitivity::detect(dir.path()).unwrap();
        assert!(matches!(
            mode,
            CaseSensitivity::Sensitive | CaseSensitivity::Insensitive
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_detect_uses_nearest_existing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CaseSensitivity::detect(&dir.path().join("modules/not/yet")).is_ok());
    }

    #[test]
    fn test_fold() {
        assert_eq!(CaseSensitivity::Sensitive.fold("Core"), "Core");
        assert_eq!(CaseSensitivity::Insensitive.fold("Core"), "core");
    }

    #[test]
    fn test_explicit_modes_skip_detection() {
        let missing = Path::new("/definitely/not/here");
        assert_eq!(
            CaseMode::Insensitive.resolve(missing).unwrap(),
            CaseSensitivity::Insensitive
        );
    }
}
