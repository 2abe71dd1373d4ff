//! Error types and the closed-world [`ErrorKind`] classification.
//!
//! [`ErrorKind`] replaces runtime type-reflection exception comparison: every
//! failure a build can produce is tagged with one of a fixed set of kinds,
//! and equality/merge decisions switch on the kind rather than on a type
//! hierarchy.

use miette::Diagnostic;
use thiserror::Error;

/// Closed set of reasons a build request can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The project file could not be parsed or evaluated.
    InvalidProjectFile,
    /// An invariant internal to the engine was violated.
    InternalError,
    /// A task ran and reported failure.
    TaskExecutionFailure,
    /// The out-of-process task host crashed or became unreachable.
    TaskHostCrash,
    /// A value could not be serialized or deserialized across a boundary.
    SerializationFailure,
    /// The request was cancelled before it completed.
    Cancellation,
}

/// Name used when a serialized exception's `type_name` is not in the local
/// registry of known exception types.
pub const GENERIC_RUNTIME_ERROR_TYPE: &str = "GenericRuntimeError";

/// A build failure, carrying enough detail to render and to chain.
///
/// `type_name` is a short, stable label (not a language type name) used to
/// decide whether two exceptions are "the same kind of thing" across a
/// serialization boundary; an unrecognized `type_name` on the receiving side
/// falls back to [`GENERIC_RUNTIME_ERROR_TYPE`] rather than failing to
/// deserialize.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BuildException {
    /// The closed-world classification of this failure.
    pub kind: ErrorKind,
    /// Stable label identifying the exception shape.
    pub type_name: String,
    /// Human-readable message.
    pub message: String,
    /// Optional captured stack trace, preserved across the host boundary.
    pub stack_trace: Option<String>,
    /// The exception this one wraps, if any.
    pub inner: Option<Box<BuildException>>,
}

impl BuildException {
    /// Construct a new exception with no inner cause.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: GENERIC_RUNTIME_ERROR_TYPE.to_string(),
            message: message.into(),
            stack_trace: None,
            inner: None,
        }
    }

    /// Attach a stable type name.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Attach a captured stack trace.
    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Wrap another exception as the cause of this one.
    #[must_use]
    pub fn with_inner(mut self, inner: BuildException) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Walk this exception and its chain of inner causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &BuildException> {
        std::iter::successors(Some(self), |e| e.inner.as_deref())
    }

    /// Unknown `type_name` values fall back to the generic label instead of
    /// failing; this normalizes a value read off the wire.
    pub fn normalize_type_name(&mut self, known: &[&str]) {
        if !known.contains(&self.type_name.as_str()) {
            self.type_name = GENERIC_RUNTIME_ERROR_TYPE.to_string();
        }
    }
}

impl std::fmt::Display for BuildException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(inner) = &self.inner {
            write!(f, " -> {inner}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildException {}

/// Error type for invariant violations inside this crate's own operations
/// (configuration identity, cache bookkeeping, and similar). Request- and
/// task-level failures use [`BuildException`] instead, since those travel
/// across serialization boundaries and carry a classification.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// An internal invariant was violated.
    #[error("internal invariant violated: {message}")]
    #[diagnostic(code(buildmux::core::internal))]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl Error {
    /// Construct an internal-invariant error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;
