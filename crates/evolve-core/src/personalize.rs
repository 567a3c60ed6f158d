//! Personalization: run every manifest file through the content critic.
//!
//! Files are processed one at a time. A rewrite replaces the file in place;
//! an unavailable critic, an ineligible extension or non-UTF-8 content is a
//! skip; an I/O or critic error fails that file only. Nothing here can fail
//! the run.

use std::path::Path;

use code_critic::ContentCritic;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::manifest::FileManifest;

/// Which files are offered to the critic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizeOptions {
    /// File extensions (without the dot) sent to the critic. Empty means all.
    pub extensions: Vec<String>,
}

impl PersonalizeOptions {
    pub fn with_extensions<I: IntoIterator<Item = S>, S: Into<String>>(extensions: I) -> Self {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    fn is_eligible(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The critic returned no result.
    CriticUnavailable,
    NotEligible,
    NotUtf8,
}

/// Per-file result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PersonalizationOutcome {
    Rewritten,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: String,
    #[serde(flatten)]
    pub outcome: PersonalizationOutcome,
}

/// Aggregated personalization statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizationStats {
    pub critic: String,
    pub personalized: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files: Vec<FileOutcome>,
}

impl PersonalizationStats {
    fn record(&mut self, path: String, outcome: PersonalizationOutcome) {
        match &outcome {
            PersonalizationOutcome::Rewritten => self.personalized += 1,
            PersonalizationOutcome::Skipped { .. } => self.skipped += 1,
            PersonalizationOutcome::Failed { .. } => self.failed += 1,
        }
        self.files.push(FileOutcome { path, outcome });
    }
}

/// Offer every regular file of `manifest` (relative to `root`) to `critic`.
pub async fn personalize_files(
    critic: &dyn ContentCritic,
    root: &Path,
    manifest: &FileManifest,
    options: &PersonalizeOptions,
) -> PersonalizationStats {
    let mut stats = PersonalizationStats {
        critic: critic.name().to_string(),
        ..PersonalizationStats::default()
    };

    for entry in manifest.files() {
        let hint = entry.path.to_string_lossy().into_owned();
        let outcome = personalize_one(critic, root, &entry.path, &hint, options).await;
        if let PersonalizationOutcome::Failed { error } = &outcome {
            warn!(path = %hint, error = %error, "personalization failed for file");
        }
        stats.record(hint, outcome);
    }

    debug!(
        critic = %stats.critic,
        personalized = stats.personalized,
        skipped = stats.skipped,
        failed = stats.failed,
        "personalization complete"
    );
    stats
}

async fn personalize_one(
    critic: &dyn ContentCritic,
    root: &Path,
    relative: &Path,
    hint: &str,
    options: &PersonalizeOptions,
) -> PersonalizationOutcome {
    if !options.is_eligible(relative) {
        return PersonalizationOutcome::Skipped {
            reason: SkipReason::NotEligible,
        };
    }

    let full = root.join(relative);
    let bytes = match tokio::fs::read(&full).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return PersonalizationOutcome::Failed {
                error: e.to_string(),
            }
        }
    };
    let Ok(content) = String::from_utf8(bytes) else {
        return PersonalizationOutcome::Skipped {
            reason: SkipReason::NotUtf8,
        };
    };

    match critic.rewrite(&content, hint).await {
        Ok(Some(rewritten)) => match tokio::fs::write(&full, rewritten).await {
            Ok(()) => PersonalizationOutcome::Rewritten,
            Err(e) => PersonalizationOutcome::Failed {
                error: e.to_string(),
            },
        },
        Ok(None) => PersonalizationOutcome::Skipped {
            reason: SkipReason::CriticUnavailable,
        },
        Err(e) => PersonalizationOutcome::Failed {
            error: e.to_string(),
        },
    }
}
