//! Kernel Guard: decides whether candidate paths may ever reach the module
//! tree.
//!
//! The check is a conservative superset test. Every manifest entry is
//! normalized (`.` dropped, trailing dots and spaces ignored, case folded
//! when the target filesystem is case-insensitive) and tested against every
//! protected root and name, plus the structural rules: no `..`, no absolute
//! paths, no aliasing segments, regular files only. All entries are checked
//! so the verdict lists every offending path.
//!
//! # Modules
//!
//! - [`protected`]: `ProtectedPaths`
//! - [`case`]: `CaseSensitivity`, `CaseMode`
//! - [`verdict`]: `SecurityVerdict`, `Violation`, `ViolationRule`
//! - [`error`]: `GuardError` / `GuardResult`

pub mod case;
pub mod error;
pub mod protected;
pub mod verdict;

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::manifest::{EntryKind, FileManifest};

pub use case::{CaseMode, CaseSensitivity};
pub use error::{GuardError, GuardResult};
pub use protected::ProtectedPaths;
pub use verdict::{SecurityVerdict, Violation, ViolationRule};

/// Guard configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub case: CaseMode,
    pub protected: ProtectedPaths,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            case: CaseMode::Auto,
            protected: ProtectedPaths::core_defaults(),
        }
    }
}

/// Segments that some filesystems treat as equal ("core." and "core ").
fn comparable(segment: &str) -> &str {
    segment.trim_end_matches(['.', ' '])
}

struct Normalized {
    segments: Vec<String>,
    problems: Vec<ViolationRule>,
}

fn flag(rule: ViolationRule, problems: &mut Vec<ViolationRule>) {
    if !problems.contains(&rule) {
        problems.push(rule);
    }
}

fn normalize(path: &Path) -> Normalized {
    let mut segments = Vec::new();
    let mut problems = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                flag(ViolationRule::AbsolutePath, &mut problems)
            }
            Component::ParentDir => flag(ViolationRule::ParentTraversal, &mut problems),
            Component::CurDir => {}
            Component::Normal(raw) => match raw.to_str() {
                Some(segment) => {
                    if segment.contains(['\\', ':', '\0']) || comparable(segment).is_empty() {
                        flag(
                            ViolationRule::InvalidComponent {
                                component: segment.to_string(),
                            },
                            &mut problems,
                        );
                    }
                    segments.push(segment.to_string());
                }
                None => flag(
                    ViolationRule::InvalidComponent {
                        component: raw.to_string_lossy().into_owned(),
                    },
                    &mut problems,
                ),
            },
        }
    }

    if segments.is_empty() && problems.is_empty() {
        problems.push(ViolationRule::EmptyPath);
    }

    Normalized { segments, problems }
}

fn reason_for(rule: &ViolationRule) -> String {
    match rule {
        ViolationRule::ParentTraversal => "contains a parent-directory segment".to_string(),
        ViolationRule::AbsolutePath => "is absolute".to_string(),
        ViolationRule::EmptyPath => "is empty after normalization".to_string(),
        ViolationRule::InvalidComponent { component } => {
            format!("segment {component:?} may alias another path")
        }
        ViolationRule::NotRegularFile { kind } => format!("is not a regular file ({kind:?})"),
        ViolationRule::ProtectedRoot { root } => format!("is inside protected root {root:?}"),
        ViolationRule::ProtectedName { name } => format!("touches protected name {name:?}"),
    }
}

/// Verifies manifests against a protected-path set.
#[derive(Debug, Clone)]
pub struct KernelGuard {
    protected: ProtectedPaths,
    case: CaseSensitivity,
    /// (configured root, folded segments)
    roots: Vec<(String, Vec<String>)>,
    /// (configured name, folded name)
    names: Vec<(String, String)>,
}

impl KernelGuard {
    /// Build a guard, validating the protected set itself.
    pub fn new(protected: ProtectedPaths, case: CaseSensitivity) -> GuardResult<Self> {
        if protected.is_empty() {
            return Err(GuardError::EmptyProtectedSet);
        }

        let mut roots = Vec::with_capacity(protected.roots.len());
        for root in &protected.roots {
            let normalized = normalize(Path::new(root));
            if !normalized.problems.is_empty() {
                return Err(GuardError::InvalidProtectedPath {
                    path: root.clone(),
                    reason: "must be a non-empty relative path without '..'".to_string(),
                });
            }
            let folded = normalized
                .segments
                .iter()
                .map(|s| case.fold(comparable(s)))
                .collect();
            roots.push((root.clone(), folded));
        }

        let mut names = Vec::with_capacity(protected.names.len());
        for name in &protected.names {
            if name.is_empty()
                || name.contains(['/', '\\'])
                || comparable(name).is_empty()
            {
                return Err(GuardError::InvalidProtectedPath {
                    path: name.clone(),
                    reason: "must be a single path segment".to_string(),
                });
            }
            names.push((name.clone(), case.fold(comparable(name))));
        }

        Ok(Self {
            protected,
            case,
            roots,
            names,
        })
    }

    /// Build from configuration, probing `modules_root` when the case mode
    /// is `auto`.
    pub fn from_config(config: &GuardConfig, modules_root: &Path) -> GuardResult<Self> {
        let case = config.case.resolve(modules_root)?;
        Self::new(config.protected.clone(), case)
    }

    pub fn protected(&self) -> &ProtectedPaths {
        &self.protected
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    /// Check every manifest entry. Unsafe if any entry breaks any rule.
    pub fn verify_integrity(&self, manifest: &FileManifest) -> SecurityVerdict {
        let violations: Vec<Violation> = manifest
            .entries()
            .iter()
            .flat_map(|entry| self.check_path(&entry.path, entry.kind))
            .collect();

        debug!(
            checked = manifest.len(),
            violations = violations.len(),
            "manifest verified"
        );

        SecurityVerdict {
            checked: manifest.len(),
            violations,
        }
    }

    /// All violations for a single candidate path.
    pub fn check_path(&self, path: &Path, kind: EntryKind) -> Vec<Violation> {
        let display = path.to_string_lossy().into_owned();
        let normalized = normalize(path);
        let mut rules = normalized.problems;

        if kind != EntryKind::File {
            rules.push(ViolationRule::NotRegularFile { kind });
        }

        let folded: Vec<String> = normalized
            .segments
            .iter()
            .map(|s| self.case.fold(comparable(s)))
            .collect();

        for (root, root_segments) in &self.roots {
            if folded.starts_with(root_segments) {
                rules.push(ViolationRule::ProtectedRoot { root: root.clone() });
            }
        }
        for (name, folded_name) in &self.names {
            if folded.iter().any(|s| s == folded_name) {
                rules.push(ViolationRule::ProtectedName { name: name.clone() });
            }
        }

        rules
            .into_iter()
            .map(|rule| Violation {
                path: display.clone(),
                reason: reason_for(&rule),
                rule,
            })
            .collect()
    }
}
