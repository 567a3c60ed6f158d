//! Log output for the `evolve` binary.
//!
//! Logs go to stderr so stdout carries only run records and verdicts.
//! Every line emitted inside a run carries the `evolve.run` span fields
//! (`run_id`, `module`): inline for text output, as `span` for JSON.

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Dependencies that are chatty at `info` and below.
const QUIET_TARGETS: &[&str] = &["surrealdb", "surrealkv", "hyper", "hyper_util", "reqwest"];

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_filter(level: Level) -> String {
    let mut directives = vec![level.to_string().to_lowercase()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Install the global subscriber. `RUST_LOG` overrides [`default_filter`].
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
            .ok();
    } else {
        // Closing the run span logs its total busy/idle time.
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .ok();
    }
}
