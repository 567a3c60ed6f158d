//! Evolution requests: validated module names and classified source locators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{EvolveError, Result};

/// Longest accepted module name.
pub const MAX_MODULE_NAME_LEN: usize = 64;

/// Identifier-safe module name: `[A-Za-z0-9_-]{1,64}`, not starting with `-`.
///
/// Used as a single path component under the modules root, so separators,
/// dots and traversal sequences are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleName(String);

impl ModuleName {
    /// Validate and wrap a module name.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| EvolveError::InvalidModuleName {
            name: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if raw.len() > MAX_MODULE_NAME_LEN {
            return Err(invalid("longer than 64 characters"));
        }
        if raw.starts_with('-') {
            return Err(invalid("must not start with '-'"));
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(invalid(&format!("character {c:?} is not allowed")));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ModuleName {
    type Error = EvolveError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ModuleName> for String {
    fn from(name: ModuleName) -> Self {
        name.0
    }
}

/// Where module content comes from. Produced once by [`SourceLocator::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLocator {
    /// Downloadable zip archive fetched over HTTP(S).
    Archive { url: String },
    /// Anything else: handed to the VCS clone tool.
    Repository { url: String },
}

impl SourceLocator {
    /// Classify a raw locator.
    ///
    /// A URL whose path ends in `.zip` or that points at a `zipball` endpoint
    /// is an archive; everything else is a repository.
    pub fn classify(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| EvolveError::InvalidLocator {
            locator: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = raw.trim();
        if url.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("contains whitespace or control characters"));
        }

        if is_archive_url(url) {
            let lower = url.to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(invalid("archive locators must use http or https"));
            }
            return Ok(SourceLocator::Archive {
                url: url.to_string(),
            });
        }

        // The clone tool would read a leading '-' as an option.
        if url.starts_with('-') {
            return Err(invalid("repository locators must not start with '-'"));
        }

        Ok(SourceLocator::Repository {
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        match self {
            SourceLocator::Archive { url } | SourceLocator::Repository { url } => url,
        }
    }

    /// `"archive"` or `"repository"`.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceLocator::Archive { .. } => "archive",
            SourceLocator::Repository { .. } => "repository",
        }
    }
}

fn is_archive_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".zip") || path.contains("zipball")
}

/// Immutable request for one evolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRequest {
    locator: SourceLocator,
    module: ModuleName,
}

impl EvolutionRequest {
    /// Validate both halves of a request.
    pub fn new(locator: &str, module: &str) -> Result<Self> {
        Ok(Self {
            locator: SourceLocator::classify(locator)?,
            module: ModuleName::parse(module)?,
        })
    }

    pub fn from_parts(locator: SourceLocator, module: ModuleName) -> Self {
        Self { locator, module }
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    pub fn module(&self) -> &ModuleName {
        &self.module
    }
}
