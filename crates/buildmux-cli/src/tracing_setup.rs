//! `tracing-subscriber` wiring for the `buildmux` binary.
//!
//! Every crate in the workspace logs through `tracing`; this module is the
//! only place a subscriber is installed, matching the teacher's
//! single-entry-point `init_tracing`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Default)]
pub enum LogFormat {
    /// Human-readable, single line per event.
    #[default]
    Compact,
    /// Structured JSON, one object per event.
    Json,
}

/// Install a global `tracing` subscriber.
///
/// The filter defaults to `warn` and is overridden by `RUST_LOG` if set, so
/// a quiet CLI session stays quiet unless the operator opts into verbosity.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    if installed.is_err() {
        // A subscriber is already installed (e.g. under a test harness); a
        // second attempt would panic, so this is a no-op, not a warning.
    }
}
