//! Error types for the results cache.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for results cache operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A request named a target that is missing from an otherwise-present
    /// configuration's cached result.
    #[error("incomplete cached result: target '{target}' missing for configuration {configuration_id}")]
    #[diagnostic(code(buildmux::results_cache::incomplete_result))]
    IncompleteResult {
        /// The configuration that has a cached result.
        configuration_id: i32,
        /// The missing target name.
        target: String,
    },

    /// An internal invariant was violated (e.g. merging across configurations).
    #[error("internal invariant violated: {message}")]
    #[diagnostic(code(buildmux::results_cache::internal))]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// I/O error while writing or reading a file-backed cache snapshot.
    #[error("I/O {operation} failed for {path}")]
    #[diagnostic(code(buildmux::results_cache::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path involved in the failing operation.
        path: std::path::PathBuf,
        /// Operation that failed (e.g. "write", "read").
        operation: String,
    },

    /// The file-backed cache snapshot could not be (de)serialized.
    #[error("serialization error: {message}")]
    #[diagnostic(code(buildmux::results_cache::serialization))]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },
}

impl Error {
    /// An incomplete-result error for a missing target.
    #[must_use]
    pub fn incomplete_result(configuration_id: i32, target: impl Into<String>) -> Self {
        Self::IncompleteResult {
            configuration_id,
            target: target.into(),
        }
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

/// Result type for results cache operations.
pub type Result<T> = std::result::Result<T, Error>;
