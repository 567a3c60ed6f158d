//! Run state machine and the terminal run record.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::EvolveError;
use crate::guard::Violation;
use crate::install::InstallMode;
use crate::personalize::PersonalizationStats;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Lifecycle of one run.
///
/// `Pending -> Downloading -> Verifying -> Personalizing -> Installing ->
/// Succeeded`, with `Failed` reachable from any non-terminal state. There is
/// no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionState {
    Pending,
    Downloading,
    Verifying,
    Personalizing,
    Installing,
    Succeeded,
    Failed,
}

impl EvolutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EvolutionState::Succeeded | EvolutionState::Failed)
    }

    /// Successor on the happy path.
    pub fn next(self) -> Option<Self> {
        match self {
            EvolutionState::Pending => Some(EvolutionState::Downloading),
            EvolutionState::Downloading => Some(EvolutionState::Verifying),
            EvolutionState::Verifying => Some(EvolutionState::Personalizing),
            EvolutionState::Personalizing => Some(EvolutionState::Installing),
            EvolutionState::Installing => Some(EvolutionState::Succeeded),
            EvolutionState::Succeeded | EvolutionState::Failed => None,
        }
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == EvolutionState::Failed || self.next() == Some(to)
    }
}

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

/// Stage names used as keys of the run record's stage map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Security,
    Personalization,
    Installation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Security => "security",
            Stage::Personalization => "personalization",
            Stage::Installation => "installation",
        }
    }
}

/// What one stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageOutcome {
    Download {
        success: bool,
        locator_kind: String,
        detail: String,
    },
    Security {
        safe: bool,
        checked: usize,
        violations: Vec<Violation>,
    },
    Personalization(PersonalizationStats),
    Installation {
        success: bool,
        mode: InstallMode,
        target: PathBuf,
        files_installed: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        digest: Option<String>,
        /// Findings of the pre-install re-verification, when it failed.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        violations: Vec<Violation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl StageOutcome {
    /// Personalization never fails the run, so it always counts as success.
    pub fn succeeded(&self) -> bool {
        match self {
            StageOutcome::Download { success, .. } => *success,
            StageOutcome::Security { safe, .. } => *safe,
            StageOutcome::Personalization(_) => true,
            StageOutcome::Installation { success, .. } => *success,
        }
    }
}

// ---------------------------------------------------------------------------
// Run record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStatus {
    Success,
    Failed,
}

/// Coarse classification of why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Sandbox,
    Download,
    Security,
    Installation,
    Internal,
}

impl From<&EvolveError> for FailureKind {
    fn from(err: &EvolveError) -> Self {
        match err {
            EvolveError::Sandbox(_) => FailureKind::Sandbox,
            EvolveError::Fetch(_) => FailureKind::Download,
            EvolveError::SecurityViolation { .. } | EvolveError::Manifest(_) => {
                FailureKind::Security
            }
            EvolveError::Install(_) => FailureKind::Installation,
            _ => FailureKind::Internal,
        }
    }
}

/// Terminal record of one run. Built by the orchestrator and never mutated
/// after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionResult {
    pub run_id: String,
    pub status: EvolutionStatus,
    pub module_name: String,
    pub repo_url: String,
    pub stages: BTreeMap<Stage, StageOutcome>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Id of the stored evolution-event memory, when the write succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_ref: Option<String>,
    pub final_state: EvolutionState,
    /// Every state the run passed through, starting with `Pending`.
    pub transitions: Vec<EvolutionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl EvolutionResult {
    pub fn is_success(&self) -> bool {
        self.status == EvolutionStatus::Success
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.get(&stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EvolutionState::*;

    #[test]
    fn test_happy_path_is_linear() {
        let mut state = Pending;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(state.can_transition_to(next));
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![Pending, Downloading, Verifying, Personalizing, Installing, Succeeded]
        );
    }

    #[test]
    fn test_failed_reachable_from_every_live_state() {
        for s in [Pending, Downloading, Verifying, Personalizing, Installing] {
            assert!(s.can_transition_to(Failed), "{s:?}");
        }
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!Pending.can_transition_to(Installing));
        assert!(!Verifying.can_transition_to(Downloading));
        assert!(!Personalizing.can_transition_to(Succeeded));
        assert!(!Installing.can_transition_to(Installing));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for to in [Pending, Downloading, Installing, Succeeded, Failed] {
            assert!(!Succeeded.can_transition_to(to));
            assert!(!Failed.can_transition_to(to));
        }
    }

    #[test]
    fn test_state_serializes_screaming() {
        assert_eq!(serde_json::to_string(&Personalizing).unwrap(), "\"PERSONALIZING\"");
    }

    #[test]
    fn test_stage_map_serializes_with_names() {
        let mut stages = BTreeMap::new();
        stages.insert(
            Stage::Security,
            StageOutcome::Security {
                safe: true,
                checked: 2,
                violations: vec![],
            },
        );
        stages.insert(
            Stage::Download,
            StageOutcome::Download {
                success: true,
                locator_kind: "archive".into(),
                detail: "extracted 2 entries".into(),
            },
        );
        let json = serde_json::to_value(&stages).unwrap();
        assert_eq!(json["download"]["success"], true);
        assert_eq!(json["security"]["checked"], 2);
        let keys: Vec<_> = stages.keys().map(|s| s.as_str()).collect();
        assert_eq!(keys, vec!["download", "security"]);
    }

    #[test]
    fn test_failure_kind_from_error() {
        let err = EvolveError::SecurityViolation {
            count: 1,
            paths: ".env".into(),
        };
        assert_eq!(FailureKind::from(&err), FailureKind::Security);
        let err = EvolveError::Config("x".into());
        assert_eq!(FailureKind::from(&err), FailureKind::Internal);
    }
}
