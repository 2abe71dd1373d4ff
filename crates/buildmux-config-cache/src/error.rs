//! Error types for configuration interning and spill.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for configuration cache operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No configuration is registered under the requested id.
    #[error("no configuration registered under id {id}")]
    #[diagnostic(code(buildmux::config_cache::not_found))]
    NotFound {
        /// The id that was looked up.
        id: i32,
    },

    /// An internal invariant was violated.
    #[error("internal invariant violated: {message}")]
    #[diagnostic(code(buildmux::config_cache::internal))]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// I/O error while spilling or retrieving a project instance.
    #[error("I/O {operation} failed for {path}")]
    #[diagnostic(code(buildmux::config_cache::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path involved in the failing operation.
        path: std::path::PathBuf,
        /// Operation that failed (e.g. "write", "read").
        operation: String,
    },

    /// The spilled project instance could not be (de)serialized.
    #[error("serialization error: {message}")]
    #[diagnostic(code(buildmux::config_cache::serialization))]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl Error {
    /// A configuration lookup miss.
    #[must_use]
    pub fn not_found(id: i32) -> Self {
        Self::NotFound { id }
    }

    /// An internal invariant violation.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// An I/O failure with path and operation context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<std::path::PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }

    /// A (de)serialization failure.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Result type for configuration cache operations.
pub type Result<T> = std::result::Result<T, Error>;
