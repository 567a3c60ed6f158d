//! Per-run bookkeeping: state transitions, stage outcomes, and the final
//! write-once [`EvolutionResult`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::domain::error::{EvolveError, Result};
use crate::domain::request::EvolutionRequest;
use crate::domain::result::{
    EvolutionResult, EvolutionState, EvolutionStatus, FailureKind, Stage, StageOutcome,
};
use crate::obs;

/// Mutable record of an in-flight run. Consumed by [`RunRecorder::finish`].
pub(crate) struct RunRecorder {
    run_id: String,
    module_name: String,
    repo_url: String,
    state: EvolutionState,
    transitions: Vec<EvolutionState>,
    stages: BTreeMap<Stage, StageOutcome>,
    error: Option<String>,
    failure: Option<FailureKind>,
    memory_ref: Option<String>,
    sandbox_path: Option<PathBuf>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl RunRecorder {
    pub(crate) fn new(request: &EvolutionRequest) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            module_name: request.module().to_string(),
            repo_url: request.locator().url().to_string(),
            state: EvolutionState::Pending,
            transitions: vec![EvolutionState::Pending],
            stages: BTreeMap::new(),
            error: None,
            failure: None,
            memory_ref: None,
            sandbox_path: None,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> EvolutionState {
        self.state
    }

    /// Move to `to`, refusing anything but the next happy-path state or
    /// `Failed`.
    pub(crate) fn advance(&mut self, to: EvolutionState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(EvolveError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.transitions.push(to);
        Ok(())
    }

    pub(crate) fn record(&mut self, stage: Stage, outcome: StageOutcome, detail: &str) {
        obs::emit_stage_finished(&self.run_id, stage, outcome.succeeded(), detail);
        self.stages.insert(stage, outcome);
    }

    /// Mark the run failed. The first failure wins.
    pub(crate) fn fail(&mut self, kind: FailureKind, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
            self.failure = Some(kind);
        }
        if !self.state.is_terminal() {
            self.state = EvolutionState::Failed;
            self.transitions.push(EvolutionState::Failed);
        }
    }

    pub(crate) fn set_memory_ref(&mut self, id: String) {
        self.memory_ref = Some(id);
    }

    pub(crate) fn set_sandbox_path(&mut self, path: PathBuf) {
        self.sandbox_path = Some(path);
    }

    pub(crate) fn finish(mut self) -> EvolutionResult {
        if !self.state.is_terminal() {
            let message = format!("run ended in non-terminal state {:?}", self.state);
            self.fail(FailureKind::Internal, message);
        }

        let status = if self.state == EvolutionState::Succeeded {
            EvolutionStatus::Success
        } else {
            EvolutionStatus::Failed
        };

        EvolutionResult {
            run_id: self.run_id,
            status,
            module_name: self.module_name,
            repo_url: self.repo_url,
            stages: self.stages,
            error: self.error,
            failure: self.failure,
            memory_ref: self.memory_ref,
            final_state: self.state,
            transitions: self.transitions,
            sandbox_path: self.sandbox_path,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms: self.clock.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> RunRecorder {
        RunRecorder::new(&EvolutionRequest::new("https://example.com/a.zip", "weather").unwrap())
    }

    #[test]
    fn test_success_path() {
        let mut run = recorder();
        for state in [
            EvolutionState::Downloading,
            EvolutionState::Verifying,
            EvolutionState::Personalizing,
            EvolutionState::Installing,
            EvolutionState::Succeeded,
        ] {
            run.advance(state).unwrap();
        }
        let result = run.finish();
        assert!(result.is_success());
        assert_eq!(result.transitions.len(), 6);
        assert!(result.error.is_none());
        assert_eq!(result.repo_url, "https://example.com/a.zip");
    }

    #[test]
    fn test_skipping_a_state_is_rejected() {
        let mut run = recorder();
        let err = run.advance(EvolutionState::Installing).unwrap_err();
        assert!(matches!(err, EvolveError::InvalidTransition { .. }));
        assert_eq!(run.state(), EvolutionState::Pending);
    }

    #[test]
    fn test_first_failure_wins_and_is_terminal() {
        let mut run = recorder();
        run.advance(EvolutionState::Downloading).unwrap();
        run.fail(FailureKind::Download, "404".into());
        run.fail(FailureKind::Internal, "later".into());
        assert!(run.advance(EvolutionState::Verifying).is_err());

        let result = run.finish();
        assert_eq!(result.status, EvolutionStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("404"));
        assert_eq!(result.failure, Some(FailureKind::Download));
        assert_eq!(
            result.transitions,
            vec![
                EvolutionState::Pending,
                EvolutionState::Downloading,
                EvolutionState::Failed
            ]
        );
    }

    #[test]
    fn test_unfinished_run_is_reported_failed() {
        let mut run = recorder();
        run.advance(EvolutionState::Downloading).unwrap();
        let result = run.finish();
        assert_eq!(result.final_state, EvolutionState::Failed);
        assert_eq!(result.failure, Some(FailureKind::Internal));
    }
}
