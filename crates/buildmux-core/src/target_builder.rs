//! The external collaborator boundary that actually runs targets.
//!
//! A `TargetBuilder` is supplied by the embedder; the request builder state
//! machine only invokes it and consumes the [`BuildResult`] it produces.
//! Building and scheduling targets within a project is out of scope here.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::BuildRequestConfiguration;
use crate::request::BuildRequest;
use crate::result::BuildResult;

/// A request for more work, emitted by a target builder mid-execution.
///
/// The request builder forwards these to the engine and suspends until
/// every one has a deposited result.
#[derive(Debug, Clone)]
pub struct SubRequest {
    /// The configuration the sub-request targets.
    pub configuration: BuildRequestConfiguration,
    /// Target names requested on that configuration.
    pub targets: Vec<String>,
}

/// The external interface a request builder drives to actually build a
/// configuration's targets.
///
/// Implementations decide how targets execute; this crate only needs to
/// invoke [`Self::build`] and fold results, emit any [`SubRequest`]s it
/// yields, and observe `cancellation` at suspension points.
#[async_trait]
pub trait TargetBuilder: Send + Sync {
    /// Build `request`'s targets against `configuration`.
    ///
    /// Implementations should periodically check `cancellation` and return
    /// promptly once it is triggered; the caller applies its own bounded
    /// wait and synthesizes a failure result on timeout regardless.
    async fn build(
        &self,
        configuration: &BuildRequestConfiguration,
        request: &BuildRequest,
        cancellation: &CancellationToken,
    ) -> TargetBuilderOutcome;
}

/// What a target builder invocation produced.
#[derive(Debug, Clone)]
pub enum TargetBuilderOutcome {
    /// The request is finished; here is its result.
    Complete(BuildResult),
    /// The builder needs these sub-requests resolved before it can
    /// continue; the request builder should suspend and resume it with
    /// [`TargetBuilder::build`] again (carrying the same configuration and
    /// request) once every sub-request has a result.
    Suspended(Vec<SubRequest>),
}
