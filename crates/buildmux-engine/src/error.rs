//! Error types for the request builder state machine and request engine.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for engine-level operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A core invariant was violated; fatal to the owning submission.
    #[error(transparent)]
    #[diagnostic(code(buildmux::engine::internal))]
    Internal(#[from] buildmux_core::Error),

    /// The config cache rejected an operation the engine attempted.
    #[error(transparent)]
    #[diagnostic(code(buildmux::engine::config_cache))]
    ConfigCache(#[from] buildmux_config_cache::Error),

    /// The results cache rejected an operation the engine attempted.
    #[error(transparent)]
    #[diagnostic(code(buildmux::engine::results_cache))]
    ResultsCache(#[from] buildmux_results_cache::Error),

    /// A request was submitted against a node id the engine does not know.
    #[error("no node registered with id {node_id}")]
    #[diagnostic(code(buildmux::engine::unknown_node))]
    UnknownNode {
        /// The unregistered node id.
        node_id: u32,
    },

    /// A submission was asked for before (or after) it could produce a
    /// result.
    #[error("submission {submission_id} has no outstanding result to await")]
    #[diagnostic(code(buildmux::engine::unknown_submission))]
    UnknownSubmission {
        /// The id that was looked up.
        submission_id: u64,
    },

    /// A request was submitted or routed before any node was registered.
    #[error("no nodes are registered to route this request to")]
    #[diagnostic(code(buildmux::engine::no_nodes_registered))]
    NoNodesRegistered,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
