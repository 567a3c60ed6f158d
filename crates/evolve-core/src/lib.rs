//! Evolve Core Library
//!
//! The self-evolution pipeline: fetch third-party module code into a
//! sandbox, verify it cannot touch the protected core, run it past the
//! content critic, and install it under `modules/<name>/`.

pub mod config;
pub mod domain;
pub mod fetch;
pub mod guard;
pub mod install;
pub mod manifest;
pub mod obs;
pub mod orchestrator;
pub mod personalize;
pub mod sandbox;
pub mod telemetry;

pub use config::{EvolveConfig, MemoryConfig, DEFAULT_MEMORY_URL};
pub use domain::{
    EvolutionRequest, EvolutionResult, EvolutionState, EvolutionStatus, EvolveError, FailureKind,
    ModuleName, Result, SourceLocator, Stage, StageOutcome,
};
pub use fetch::{extract_zip, FetchConfig, FetchError, FetchReport, Fetcher, NetworkFetcher};
pub use guard::{
    CaseMode, CaseSensitivity, GuardConfig, GuardError, KernelGuard, ProtectedPaths,
    SecurityVerdict, Violation, ViolationRule,
};
pub use install::{InstallConfig, InstallError, InstallMode, InstallReport, Installer};
pub use manifest::{EntryKind, FileManifest, ManifestEntry, ManifestFilter};
pub use orchestrator::{open_memory_store, EvolutionEngine, EVOLUTION_EVENT_KIND};
pub use personalize::{
    personalize_files, FileOutcome, PersonalizationOutcome, PersonalizationStats,
    PersonalizeOptions, SkipReason,
};
pub use sandbox::{ReapReport, Sandbox, SandboxConfig, SandboxError, SandboxManager};
pub use telemetry::init_tracing;

pub use code_critic::{select_critic, ContentCritic, CriticConfig, NoopCritic};
pub use evolve_memory::{MemoryRecord, MemoryStore, OfflineMemoryStore};

/// Evolve version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
