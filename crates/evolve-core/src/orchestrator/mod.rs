//! Orchestrator: sequences the evolution stages for one request.
//!
//! `Pending -> Downloading -> Verifying -> Personalizing -> Installing ->
//! Succeeded`, or `Failed` from any stage. Each stage is a hard gate. The
//! sandbox is released on every exit path, and the whole sequence runs
//! inside a panic catch-all so a fault anywhere still yields a `Failed`
//! record instead of tearing down the caller.

mod run;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use code_critic::{select_critic, ContentCritic};
use evolve_memory::{MemoryStore, OfflineMemoryStore, SurrealMemoryStore, KIND_KEY};
use futures::FutureExt;
use serde_json::json;
use tracing::{warn, Instrument};

use crate::config::{EvolveConfig, MemoryConfig};
use crate::domain::error::{EvolveError, Result};
use crate::domain::request::EvolutionRequest;
use crate::domain::result::{EvolutionResult, EvolutionState, FailureKind, Stage, StageOutcome};
use crate::fetch::{Fetcher, NetworkFetcher};
use crate::guard::{KernelGuard, SecurityVerdict};
use crate::install::{InstallReport, Installer};
use crate::manifest::{FileManifest, ManifestFilter};
use crate::obs;
use crate::personalize::{personalize_files, PersonalizeOptions};
use crate::sandbox::{Sandbox, SandboxManager};

use run::RunRecorder;

/// Memory `type` of the record written after a successful run.
pub const EVOLUTION_EVENT_KIND: &str = "evolution_event";

/// Open the configured memory store.
pub async fn open_memory_store(config: &MemoryConfig) -> Result<Arc<dyn MemoryStore>> {
    let store = SurrealMemoryStore::connect(&config.url).await?;
    Ok(Arc::new(store))
}

/// Runs evolution requests through the staged pipeline.
pub struct EvolutionEngine {
    sandboxes: SandboxManager,
    fetcher: Arc<dyn Fetcher>,
    guard: KernelGuard,
    critic: Arc<dyn ContentCritic>,
    installer: Installer,
    memory: Arc<dyn MemoryStore>,
    manifest_filter: ManifestFilter,
    personalize: PersonalizeOptions,
}

impl EvolutionEngine {
    pub fn new(
        sandboxes: SandboxManager,
        fetcher: Arc<dyn Fetcher>,
        guard: KernelGuard,
        critic: Arc<dyn ContentCritic>,
        installer: Installer,
        memory: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            sandboxes,
            fetcher,
            guard,
            critic,
            installer,
            memory,
            manifest_filter: ManifestFilter::default(),
            personalize: PersonalizeOptions::default(),
        }
    }

    /// Wire every collaborator from configuration. Checks the critic once;
    /// an unreachable memory backend degrades to [`OfflineMemoryStore`].
    pub async fn from_config(config: &EvolveConfig) -> Result<Self> {
        let fetcher = Arc::new(NetworkFetcher::new(config.fetch.clone())?);
        let guard = KernelGuard::from_config(&config.guard, &config.install.modules_root)?;
        let critic = select_critic(&config.critic).await;
        let memory = match open_memory_store(&config.memory).await {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    url = %config.memory.url,
                    error = %e,
                    "memory backend unavailable, evolution events will not be recorded"
                );
                Arc::new(OfflineMemoryStore::new(e.to_string()))
            }
        };

        Ok(Self::new(
            SandboxManager::from_config(&config.sandbox),
            fetcher,
            guard,
            critic,
            Installer::from_config(&config.install),
            memory,
        )
        .with_manifest_filter(config.manifest.clone())
        .with_personalize_options(config.personalize.clone()))
    }

    pub fn with_manifest_filter(mut self, filter: ManifestFilter) -> Self {
        self.manifest_filter = filter;
        self
    }

    pub fn with_personalize_options(mut self, options: PersonalizeOptions) -> Self {
        self.personalize = options;
        self
    }

    pub fn guard(&self) -> &KernelGuard {
        &self.guard
    }

    pub fn critic_name(&self) -> &str {
        self.critic.name()
    }

    /// Run one request to a terminal state. Never panics and never returns
    /// an error: every outcome is in the returned record.
    pub async fn evolve(&self, request: &EvolutionRequest) -> EvolutionResult {
        let mut run = RunRecorder::new(request);
        let run_id = run.run_id().to_string();
        let module = request.module().as_str();
        let span = obs::evolution_span(&run_id, module);

        obs::emit_evolution_started(
            &run_id,
            module,
            request.locator().url(),
            request.locator().kind(),
        );

        let outcome = AssertUnwindSafe(self.run_stages(request, &mut run).instrument(span))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => run.fail(FailureKind::from(&e), e.to_string()),
            Err(panic) => run.fail(
                FailureKind::Internal,
                format!("internal fault: {}", panic_message(panic.as_ref())),
            ),
        }

        let result = run.finish();
        obs::emit_evolution_finished(&run_id, module, result.duration_ms, result.is_success());
        result
    }

    async fn run_stages(&self, request: &EvolutionRequest, run: &mut RunRecorder) -> Result<()> {
        run.advance(EvolutionState::Downloading)?;

        let mut sandbox = match self.sandboxes.acquire() {
            Ok(sandbox) => sandbox,
            Err(e) => {
                let detail = e.to_string();
                run.record(
                    Stage::Download,
                    StageOutcome::Download {
                        success: false,
                        locator_kind: request.locator().kind().to_string(),
                        detail: detail.clone(),
                    },
                    &detail,
                );
                return Err(e.into());
            }
        };
        run.set_sandbox_path(sandbox.path().to_path_buf());

        let outcome = self.run_in_sandbox(request, &sandbox, run).await;

        if let Err(e) = sandbox.release() {
            warn!(error = %e, "sandbox release failed");
        }
        outcome
    }

    async fn run_in_sandbox(
        &self,
        request: &EvolutionRequest,
        sandbox: &Sandbox,
        run: &mut RunRecorder,
    ) -> Result<()> {
        let locator = request.locator();

        // Download
        match self.fetcher.fetch(locator, sandbox.path()).await {
            Ok(report) => {
                let detail = report.describe();
                run.record(
                    Stage::Download,
                    StageOutcome::Download {
                        success: true,
                        locator_kind: locator.kind().to_string(),
                        detail: detail.clone(),
                    },
                    &detail,
                );
            }
            Err(e) => {
                let detail = e.to_string();
                run.record(
                    Stage::Download,
                    StageOutcome::Download {
                        success: false,
                        locator_kind: locator.kind().to_string(),
                        detail: detail.clone(),
                    },
                    &detail,
                );
                return Err(e.into());
            }
        }

        // Security verification
        run.advance(EvolutionState::Verifying)?;
        let manifest = match self.scan(sandbox) {
            Ok(manifest) => manifest,
            Err(e) => {
                run.record(
                    Stage::Security,
                    StageOutcome::Security {
                        safe: false,
                        checked: 0,
                        violations: Vec::new(),
                    },
                    &e.to_string(),
                );
                return Err(e);
            }
        };
        let verdict = self.guard.verify_integrity(&manifest);
        run.record(
            Stage::Security,
            StageOutcome::Security {
                safe: verdict.is_safe(),
                checked: verdict.checked,
                violations: verdict.violations.clone(),
            },
            &format!("{} path(s) checked", verdict.checked),
        );
        reject_unsafe(run.run_id(), &verdict)?;

        // Personalization
        run.advance(EvolutionState::Personalizing)?;
        let stats = personalize_files(
            self.critic.as_ref(),
            sandbox.path(),
            &manifest,
            &self.personalize,
        )
        .await;
        let detail = format!(
            "{} personalized, {} skipped, {} failed",
            stats.personalized, stats.skipped, stats.failed
        );
        run.record(
            Stage::Personalization,
            StageOutcome::Personalization(stats),
            &detail,
        );

        // Installation
        run.advance(EvolutionState::Installing)?;
        let report = self.reverify_and_install(request, sandbox, run).await?;

        run.advance(EvolutionState::Succeeded)?;
        self.remember(request, &report, run).await;
        Ok(())
    }

    fn scan(&self, sandbox: &Sandbox) -> Result<FileManifest> {
        FileManifest::scan(sandbox.path(), &self.manifest_filter).map_err(EvolveError::Manifest)
    }

    /// Recompute the manifest after personalization, verify it again, then
    /// install exactly that manifest.
    async fn reverify_and_install(
        &self,
        request: &EvolutionRequest,
        sandbox: &Sandbox,
        run: &mut RunRecorder,
    ) -> Result<InstallReport> {
        let target = self.installer.target_for(request.module());
        let failed = |violations, detail: String| StageOutcome::Installation {
            success: false,
            mode: self.installer.mode(),
            target: target.clone(),
            files_installed: 0,
            digest: None,
            violations,
            detail: Some(detail),
        };

        let manifest = match self.scan(sandbox) {
            Ok(manifest) => manifest,
            Err(e) => {
                let detail = e.to_string();
                run.record(Stage::Installation, failed(Vec::new(), detail.clone()), &detail);
                return Err(e);
            }
        };
        let verdict = self.guard.verify_integrity(&manifest);
        if !verdict.is_safe() {
            let detail = "re-verification before install failed".to_string();
            run.record(
                Stage::Installation,
                failed(verdict.violations.clone(), detail.clone()),
                &detail,
            );
            reject_unsafe(run.run_id(), &verdict)?;
        }

        let installer = self.installer.clone();
        let source = sandbox.path().to_path_buf();
        let module = request.module().clone();
        let task = tokio::task::spawn_blocking(move || installer.install(&source, &module, &manifest));
        let installed = match task.await {
            Ok(installed) => installed,
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(join) => {
                return Err(EvolveError::Io(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    join.to_string(),
                )))
            }
        };

        match installed {
            Ok(report) => {
                let detail = format!("{} file(s) installed", report.files_installed);
                run.record(
                    Stage::Installation,
                    StageOutcome::Installation {
                        success: true,
                        mode: report.mode,
                        target: report.target.clone(),
                        files_installed: report.files_installed,
                        digest: Some(report.digest.clone()),
                        violations: Vec::new(),
                        detail: None,
                    },
                    &detail,
                );
                Ok(report)
            }
            Err(e) => {
                let detail = e.to_string();
                run.record(Stage::Installation, failed(Vec::new(), detail.clone()), &detail);
                Err(e.into())
            }
        }
    }

    /// Best-effort evolution-event memory. Failure is logged, not fatal.
    async fn remember(
        &self,
        request: &EvolutionRequest,
        report: &InstallReport,
        run: &mut RunRecorder,
    ) {
        let module = request.module().as_str();
        let url = request.locator().url();
        let content = format!("Successfully evolved: installed '{module}' module from {url}");
        let metadata = json!({
            KIND_KEY: EVOLUTION_EVENT_KIND,
            "module": module,
            "repo": url,
            "run_id": run.run_id(),
            "digest": report.digest,
            "files_installed": report.files_installed,
        });

        match self.memory.remember(&content, metadata).await {
            Ok(id) => run.set_memory_ref(id.to_string()),
            Err(e) => obs::emit_memory_write_failed(run.run_id(), &e),
        }
    }
}

fn reject_unsafe(run_id: &str, verdict: &SecurityVerdict) -> Result<()> {
    if verdict.is_safe() {
        return Ok(());
    }
    obs::emit_security_violation(run_id, verdict);
    Err(EvolveError::SecurityViolation {
        count: verdict.offending_paths().len(),
        paths: verdict.summary(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
