//! Security verdicts: the guard's decision as a value.

use serde::{Deserialize, Serialize};

use crate::manifest::EntryKind;

/// Which rule a path broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationRule {
    /// A `..` segment.
    ParentTraversal,
    /// Absolute path, drive prefix or root.
    AbsolutePath,
    /// Nothing left after normalization.
    EmptyPath,
    /// A segment that could alias something else on some filesystem.
    InvalidComponent { component: String },
    /// Symlink, device, FIFO or socket.
    NotRegularFile { kind: EntryKind },
    /// Equal to or nested under a protected root.
    ProtectedRoot { root: String },
    /// A segment named like a protected file or directory.
    ProtectedName { name: String },
}

/// A single offending path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub rule: ViolationRule,
    pub reason: String,
}

/// Outcome of verifying a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    /// Number of manifest entries examined
    pub checked: usize,
    /// Every violation found; empty when safe
    pub violations: Vec<Violation>,
}

impl SecurityVerdict {
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }

    /// Distinct offending paths in manifest order.
    pub fn offending_paths(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for v in &self.violations {
            if !seen.contains(&v.path.as_str()) {
                seen.push(&v.path);
            }
        }
        seen
    }

    /// Comma-separated offending paths, for error messages.
    pub fn summary(&self) -> String {
        self.offending_paths().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(path: &str, rule: ViolationRule) -> Violation {
        Violation {
            path: path.to_string(),
            rule,
            reason: String::new(),
        }
    }

    #[test]
    fn test_empty_verdict_is_safe() {
        let verdict = SecurityVerdict {
            checked: 3,
            violations: vec![],
        };
        assert!(verdict.is_safe());
        assert_eq!(verdict.summary(), "");
    }

    #[test]
    fn test_offending_paths_are_deduplicated() {
        let verdict = SecurityVerdict {
            checked: 2,
            violations: vec![
                violation("../core/a", ViolationRule::ParentTraversal),
                violation(
                    "../core/a",
                    ViolationRule::ProtectedRoot {
                        root: "core".into(),
                    },
                ),
                violation(
                    ".env",
                    ViolationRule::ProtectedName {
                        name: ".env".into(),
                    },
                ),
            ],
        };
        assert!(!verdict.is_safe());
        assert_eq!(verdict.offending_paths(), vec!["../core/a", ".env"]);
        assert_eq!(verdict.summary(), "../core/a, .env");
    }

    #[test]
    fn test_rule_serializes_tagged() {
        let json = serde_json::to_value(ViolationRule::ProtectedRoot {
            root: "core".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "protected_root");
        assert_eq!(json["root"], "core");
    }
}
