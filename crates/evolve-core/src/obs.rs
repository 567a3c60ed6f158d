//! Structured observability hooks for the evolution run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via [`evolution_span`]
//! - Emission functions for key lifecycle events: start, stage finished,
//!   security violation, finish, memory write failure
//!
//! Events are emitted at `info!` level except violations and failures, which
//! are `warn!`. Filter with `RUST_LOG`; pass `--json` to the CLI for JSON.

use tracing::{info, warn};

use crate::domain::result::Stage;
use crate::guard::SecurityVerdict;

/// Run-scoped span tagged with the run id and module name.
///
/// Attach it to the run future with `tracing::Instrument` so every event
/// emitted by the pipeline carries both fields.
///
/// # Example
///
/// ```ignore
/// engine.run(request).instrument(evolution_span("5f0c…", "weather")).await;
/// ```
pub fn evolution_span(run_id: &str, module: &str) -> tracing::Span {
    tracing::info_span!("evolve.run", run_id = %run_id, module = %module)
}

/// Emit event: run started for a module and locator.
pub fn emit_evolution_started(run_id: &str, module: &str, locator: &str, locator_kind: &str) {
    info!(
        event = "evolution.started",
        run_id = %run_id,
        module = %module,
        locator = %locator,
        locator_kind = %locator_kind,
    );
}

/// Emit event: one stage finished.
pub fn emit_stage_finished(run_id: &str, stage: Stage, success: bool, detail: &str) {
    info!(
        event = "evolution.stage_finished",
        run_id = %run_id,
        stage = stage.as_str(),
        success = success,
        detail = %detail,
    );
}

/// Emit one warning per violation so each offending path is searchable.
pub fn emit_security_violation(run_id: &str, verdict: &SecurityVerdict) {
    for violation in &verdict.violations {
        warn!(
            event = "evolution.security_violation",
            run_id = %run_id,
            path = %violation.path,
            reason = %violation.reason,
        );
    }
}

/// Emit event: run finished.
pub fn emit_evolution_finished(run_id: &str, module: &str, duration_ms: u64, success: bool) {
    info!(
        event = "evolution.finished",
        run_id = %run_id,
        module = %module,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: the evolution-event memory could not be written (warning level).
pub fn emit_memory_write_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "evolution.memory_write_failed", run_id = %run_id, error = %error);
}
