//! Evolve CLI
//!
//! The `evolve` command drives the self-evolution pipeline.
//!
//! ## Commands
//!
//! - `run`: Fetch, verify, personalize and install a module
//! - `verify`: Audit a directory with the Kernel Guard
//! - `reap`: Remove stale sandbox directories
//! - `history`: Show past evolution events from memory
//! - `show-config`: Print the resolved configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evolve_core::{
    open_memory_store, EvolutionEngine, EvolutionRequest, EvolveConfig, FileManifest,
    InstallMode, KernelGuard, ManifestFilter, MemoryRecord, MemoryStore, SandboxManager,
    EVOLUTION_EVENT_KIND,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "evolve")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Self-evolving module installer", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "EVOLVE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve a new module from an archive URL or repository locator
    Run {
        /// Archive URL (`.zip` / zipball) or repository locator
        url: String,

        /// Name of the module directory to install into
        module: String,

        /// Override the modules directory
        #[arg(long)]
        modules_dir: Option<PathBuf>,

        /// Install through a staging directory with rollback
        #[arg(long)]
        staged: bool,
    },

    /// Check a directory against the protected set
    Verify {
        /// Directory to audit
        dir: PathBuf,

        /// Include hidden and excluded directories in the audit
        #[arg(long)]
        all: bool,
    },

    /// Remove leftover sandbox directories
    Reap {
        /// Minimum age in seconds (defaults to `sandbox.stale_after_secs`)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },

    /// Show recent evolution events
    History {
        /// Maximum number of events
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Print the resolved configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    evolve_core::init_tracing(cli.json, level);

    let config = EvolveConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            url,
            module,
            modules_dir,
            staged,
        } => cmd_run(config, &url, &module, modules_dir, staged).await,
        Commands::Verify { dir, all } => cmd_verify(&config, &dir, all),
        Commands::Reap { max_age_secs } => cmd_reap(&config, max_age_secs),
        Commands::History { limit } => cmd_history(&config, limit).await,
        Commands::ShowConfig => cmd_show_config(&config),
    }
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_run_overrides(config: &mut EvolveConfig, modules_dir: Option<PathBuf>, staged: bool) {
    if let Some(dir) = modules_dir {
        config.install.modules_root = dir;
    }
    if staged {
        config.install.mode = InstallMode::Staged;
    }
}

/// Run one evolution and print the run record
async fn cmd_run(
    mut config: EvolveConfig,
    url: &str,
    module: &str,
    modules_dir: Option<PathBuf>,
    staged: bool,
) -> Result<()> {
    apply_run_overrides(&mut config, modules_dir, staged);
    config.validate().context("Invalid configuration")?;

    let request = EvolutionRequest::new(url, module).context("Invalid evolution request")?;
    let engine = EvolutionEngine::from_config(&config)
        .await
        .context("Failed to set up the evolution engine")?;
    info!(critic = engine.critic_name(), "engine ready");

    let result = engine.evolve(&request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "evolution of '{}' failed: {}",
            module,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Audit a directory and print the verdict
fn cmd_verify(config: &EvolveConfig, dir: &Path, all: bool) -> Result<()> {
    let filter = if all {
        ManifestFilter::none()
    } else {
        config.manifest.clone()
    };
    let manifest = FileManifest::scan(dir, &filter)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    let guard = KernelGuard::from_config(&config.guard, &config.install.modules_root)
        .context("Invalid guard configuration")?;

    let verdict = guard.verify_integrity(&manifest);
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    if verdict.is_safe() {
        println!("\n✓ {} file(s) checked, no violations", verdict.checked);
        Ok(())
    } else {
        anyhow::bail!("unsafe content: {}", verdict.summary())
    }
}

/// Remove stale sandboxes
fn cmd_reap(config: &EvolveConfig, max_age_secs: Option<u64>) -> Result<()> {
    let manager = SandboxManager::from_config(&config.sandbox);
    let max_age = Duration::from_secs(max_age_secs.unwrap_or(config.sandbox.stale_after_secs));

    let report = manager
        .reap_stale(max_age)
        .with_context(|| format!("Failed to reap sandboxes in {}", manager.root().display()))?;

    for path in &report.removed {
        println!("removed {}", path.display());
    }
    for (path, error) in &report.failed {
        println!("failed  {} ({})", path.display(), error);
    }
    println!(
        "Summary: {} removed, {} failed, {} kept",
        report.removed.len(),
        report.failed.len(),
        report.kept
    );

    Ok(())
}

/// Evolution events recorded by earlier runs, newest first.
async fn recent_events(config: &EvolveConfig, limit: usize) -> Result<Vec<MemoryRecord>> {
    let store = open_memory_store(&config.memory)
        .await
        .with_context(|| format!("Failed to open memory store {}", config.memory.url))?;
    store
        .recall(EVOLUTION_EVENT_KIND, limit)
        .await
        .context("Failed to recall evolution events")
}

/// Show recent evolution events
async fn cmd_history(config: &EvolveConfig, limit: usize) -> Result<()> {
    let events = recent_events(config, limit).await?;

    if events.is_empty() {
        println!("No evolution events found in {}", config.memory.url);
        return Ok(());
    }

    for event in events {
        println!("event {}", event.id);
        println!(
            "Date:   {}",
            event.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(module) = event.metadata.get("module").and_then(|v| v.as_str()) {
            println!("Module: {}", module);
        }
        println!();
        println!("    {}", event.content);
        println!();
    }

    Ok(())
}

fn cmd_show_config(config: &EvolveConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_cli_parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "evolve",
            "--verbose",
            "run",
            "https://example.com/skill.zip",
            "weather",
            "--modules-dir",
            "/tmp/mods",
            "--staged",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                url,
                module,
                modules_dir,
                staged,
            } => {
                assert_eq!(url, "https://example.com/skill.zip");
                assert_eq!(module, "weather");
                assert_eq!(modules_dir, Some(PathBuf::from("/tmp/mods")));
                assert!(staged);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_requires_module_name() {
        assert!(Cli::try_parse_from(["evolve", "run", "https://example.com/skill.zip"]).is_err());
    }

    #[test]
    fn test_run_overrides_replace_config_values() {
        let mut config = EvolveConfig::default();
        apply_run_overrides(&mut config, Some(PathBuf::from("elsewhere")), true);
        assert_eq!(config.install.modules_root, PathBuf::from("elsewhere"));
        assert_eq!(config.install.mode, InstallMode::Staged);

        let mut untouched = EvolveConfig::default();
        apply_run_overrides(&mut untouched, None, false);
        assert_eq!(untouched, EvolveConfig::default());
    }

    #[test]
    fn test_verify_accepts_clean_dir_and_rejects_protected_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tool")).unwrap();
        fs::write(dir.path().join("tool/main.py"), "print(1)").unwrap();

        let mut config = EvolveConfig::default();
        config.install.modules_root = dir.path().join("modules");
        assert!(cmd_verify(&config, dir.path(), false).is_ok());

        fs::create_dir_all(dir.path().join("core")).unwrap();
        fs::write(dir.path().join("core/brain.py"), "x").unwrap();
        let err = cmd_verify(&config, dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("core/brain.py"));
    }

    #[test]
    fn test_reap_on_missing_root_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EvolveConfig::default();
        config.sandbox.root = dir.path().join("absent");
        assert!(cmd_reap(&config, Some(0)).is_ok());
    }

    fn config_with_memory_in(dir: &Path) -> EvolveConfig {
        let mut config = EvolveConfig::default();
        config.memory.url = format!("surrealkv://{}", dir.join("db").display());
        config
    }

    #[tokio::test]
    async fn test_history_on_fresh_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_memory_in(dir.path());
        assert!(cmd_history(&config, 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_history_sees_events_from_an_earlier_process() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_memory_in(dir.path());

        {
            let store = open_memory_store(&config.memory).await.unwrap();
            store
                .remember(
                    "Successfully evolved: installed 'weather' module from https://example.com/w.zip",
                    serde_json::json!({"type": EVOLUTION_EVENT_KIND, "module": "weather"}),
                )
                .await
                .unwrap();
        }

        // The earlier handle closes in the background.
        let mut events = None;
        for _ in 0..50 {
            if let Ok(found) = recent_events(&config, 10).await {
                events = Some(found);
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let events = events.expect("store should reopen");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata["module"], "weather");
    }

    #[tokio::test]
    async fn test_history_reports_unreachable_backend() {
        let mut config = EvolveConfig::default();
        config.memory.url = "ws://127.0.0.1:1".to_string();
        assert!(recent_events(&config, 5).await.is_err());
    }
}
