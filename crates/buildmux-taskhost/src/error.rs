//! Error types for the out-of-process task host client.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for task host lifecycle and callback operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The task host process could not be spawned.
    #[error("failed to spawn task host for {runtime}/{architecture}: {source}")]
    #[diagnostic(code(buildmux::taskhost::spawn_failed))]
    SpawnFailed {
        /// Target runtime requested (e.g. "net8.0", "clr4").
        runtime: String,
        /// Target architecture requested (e.g. "x64").
        architecture: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A completion packet failed its mutual-exclusion validation.
    #[error(transparent)]
    #[diagnostic(code(buildmux::taskhost::invalid_completion))]
    InvalidCompletion(#[from] buildmux_core::Error),

    /// The task host did not exit within the bounded interval after
    /// reporting completion.
    #[error("task host for {runtime}/{architecture} (pid {pid}) did not exit within {timeout_ms}ms")]
    #[diagnostic(code(buildmux::taskhost::exit_timeout), severity(warning))]
    ExitTimeout {
        /// Target runtime the host was serving.
        runtime: String,
        /// Target architecture the host was serving.
        architecture: String,
        /// Observed process id.
        pid: u32,
        /// The bound that was exceeded.
        timeout_ms: u64,
    },

    /// A callback response referenced a `request_id` with no pending
    /// completion registered.
    #[error("unknown callback request_id {request_id}, response dropped")]
    #[diagnostic(code(buildmux::taskhost::unknown_request_id), severity(warning))]
    UnknownRequestId {
        /// The unmatched id.
        request_id: u64,
    },

    /// A task attempted a coordinator callback, but the coordinator did
    /// not advertise callback support on handshake.
    #[error("E-CALLBACK-UNSUPPORTED: coordinator does not support task-host callbacks")]
    #[diagnostic(code(buildmux::taskhost::callback_unsupported))]
    CallbackUnsupported,
}

/// Result type for task host operations.
pub type Result<T> = std::result::Result<T, Error>;
