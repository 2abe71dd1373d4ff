//! Structured logging and telemetry for buildmux.
//!
//! Every component in the workspace logs through [`tracing`] spans/events
//! rather than `println!`/`eprintln!`, and every build event that crosses a
//! node boundary is also representable as a [`BuildEvent`] so it can be
//! carried inside a `LogMessage` packet (see `buildmux-proto`).
//!
//! This crate additionally owns the environment-variable-gated ambient
//! concerns that don't belong to any one component: the debug dump file
//! writer, and the telemetry opt-out/sampling gate.

pub mod dump;
pub mod event;
pub mod redaction;
pub mod telemetry;

pub use event::{BuildEvent, EventSeverity};
pub use redaction::{REDACTED_PLACEHOLDER, redact, register_secret, register_secrets};
pub use telemetry::{TelemetryService, TelemetryState};

/// Emit a structured error event through `tracing`, tagged for the
/// `buildmux::error` target so a subscriber can route it independently of
/// ordinary build progress output.
#[macro_export]
macro_rules! emit_build_error {
    ($code:expr, $message:expr) => {
        ::tracing::error!(
            target: "buildmux::error",
            error_code = $code,
            message = %$message,
        )
    };
}

/// Emit a structured warning event through `tracing`.
#[macro_export]
macro_rules! emit_build_warning {
    ($code:expr, $message:expr) => {
        ::tracing::warn!(
            target: "buildmux::warning",
            error_code = $code,
            message = %$message,
        )
    };
}
