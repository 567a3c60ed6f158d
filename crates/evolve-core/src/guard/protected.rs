//! The protected-path set handed to the guard.

use serde::{Deserialize, Serialize};

/// Paths the evolution pipeline must never write.
///
/// `roots` are relative directory (or file) paths: any candidate equal to or
/// nested under one is protected. `names` are single path segments protected
/// wherever they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedPaths {
    pub roots: Vec<String>,
    pub names: Vec<String>,
}

impl ProtectedPaths {
    /// The immutable core: the `core` package, the environment/secrets file
    /// and VCS metadata.
    pub fn core_defaults() -> Self {
        Self {
            roots: vec!["core".to_string()],
            names: vec![".env".to_string(), ".git".to_string()],
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.roots.push(root.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.names.push(name.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_defaults() {
        let paths = ProtectedPaths::core_defaults();
        assert_eq!(paths.roots, vec!["core"]);
        assert!(paths.names.contains(&".env".to_string()));
        assert!(paths.names.contains(&".git".to_string()));
    }

    #[test]
    fn test_builders_extend() {
        let paths = ProtectedPaths::default()
            .with_root("memory/vault")
            .with_name("credentials.json");
        assert!(!paths.is_empty());
        assert_eq!(paths.roots, vec!["memory/vault"]);
        assert_eq!(paths.names, vec!["credentials.json"]);
    }
}
