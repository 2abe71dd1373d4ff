//! The request builder state machine: drives a single request through
//! `Ready -> Active -> Waiting -> Active -> Complete`, per spec §4.3.
//!
//! A builder is "Active" while inside [`buildmux_core::TargetBuilder::build`],
//! "Waiting" while [`crate::engine::RequestEngine::dispatch_subrequests`]
//! collects results for a suspension's sub-requests, and "Complete" once the
//! target builder returns a final [`BuildResult`] or cancellation forces a
//! synthetic one. The engine owns *where* a request runs and how its
//! sub-requests are routed; this module owns *how one request's own
//! invocation loop* progresses.

use std::sync::Arc;

use buildmux_core::error::{BuildException, ErrorKind};
use buildmux_core::request::BuildRequest;
use buildmux_core::result::{BuildResult, TargetResult, WorkUnitResult};
use buildmux_core::target_builder::TargetBuilderOutcome;
use tokio_util::sync::CancellationToken;

use crate::cancellation::{race_against_cancellation, synthesize_cancelled_result};
use crate::chain::RequestChain;
use crate::engine::RequestEngine;

/// Build a `Failure`/`Stop` result carrying an `InternalError` exception for
/// every requested target, used when an engine-internal invariant fails
/// mid-request (configuration missing from the cache, sub-request dispatch
/// failure). Fatal for the owning submission; never retried.
fn internal_error_result(request: &BuildRequest, message: impl Into<String>) -> BuildResult {
    let exception = BuildException::new(ErrorKind::InternalError, message.into());
    let mut result = BuildResult::new(request.configuration_id, request.submission_id, request.node_request_id);
    result.global_request_id = request.global_request_id;
    result.parent_global_request_id = request.parent_global_request_id;
    result.exception = Some(exception.clone());
    for target in &request.targets {
        result.set_target(
            target.clone(),
            TargetResult {
                work_unit_result: WorkUnitResult::failure_stop(exception.clone()),
                items: Vec::new(),
            },
        );
    }
    result
}

/// Drive `request` to completion: repeatedly invoke the configured
/// `TargetBuilder`, forwarding any `Suspended` sub-requests to the engine
/// and resuming once they are all resolved, until a `Complete` outcome or
/// cancellation produces a final [`BuildResult`].
pub(crate) async fn run_request(
    engine: Arc<RequestEngine>,
    request: BuildRequest,
    chain: RequestChain,
    cancellation: CancellationToken,
) -> BuildResult {
    let Some(configuration) = engine.config_cache().get(request.configuration_id) else {
        return internal_error_result(&request, "configuration not found in config cache");
    };

    // Extend the ancestry chain with this request's own targets before
    // dispatching any children, so a sub-request that loops back to the
    // request currently running is caught as a cycle too, not just loops
    // back to some stricter ancestor.
    let mut self_chain = chain;
    for target in &request.targets {
        self_chain = self_chain.extended(request.configuration_id, target.clone());
    }

    loop {
        let build = engine.target_builder().build(&configuration, &request, &cancellation);
        let outcome = match race_against_cancellation(build, &cancellation, engine.cancellation_bound()).await {
            Some(outcome) => outcome,
            None => return synthesize_cancelled_result(&request),
        };

        match outcome {
            TargetBuilderOutcome::Complete(mut result) => {
                result.global_request_id = request.global_request_id;
                result.parent_global_request_id = request.parent_global_request_id;
                return result;
            }
            TargetBuilderOutcome::Suspended(subrequests) => {
                if let Err(error) =
                    RequestEngine::dispatch_subrequests(&engine, &request, &self_chain, &cancellation, subrequests)
                        .await
                {
                    return internal_error_result(&request, error.to_string());
                }
            }
        }
    }
}
