//! Cooperative, bounded cancellation for in-flight request builders.

use std::time::Duration;

use buildmux_core::error::{BuildException, ErrorKind};
use buildmux_core::request::BuildRequest;
use buildmux_core::result::{ActionCode, BuildResult, TargetResult, TargetResultCode, WorkUnitResult};
use tokio_util::sync::CancellationToken;

/// Default bound the engine waits for a builder to finalize after
/// cancellation before synthesizing a failure result, per spec §5.
pub const DEFAULT_CANCELLATION_BOUND: Duration = Duration::from_secs(5);

/// A synthetic `BuildResult` for a request whose builder did not finalize
/// within the cooperative-cancellation bound.
///
/// Every requested target gets a `Failure`/`Stop` entry with no exception,
/// matching the "Failure results with no exception" rule for cancellation
/// outcomes; the build is still reported as cancelled, not crashed.
#[must_use]
pub fn synthesize_cancelled_result(request: &BuildRequest) -> BuildResult {
    let mut result = BuildResult::new(request.configuration_id, request.submission_id, request.node_request_id);
    result.global_request_id = request.global_request_id;
    result.parent_global_request_id = request.parent_global_request_id;
    for target in &request.targets {
        result.set_target(
            target.clone(),
            TargetResult {
                work_unit_result: WorkUnitResult {
                    result_code: TargetResultCode::Failure,
                    action_code: ActionCode::Stop,
                    exception: None,
                },
                items: Vec::new(),
            },
        );
    }
    result
}

/// Wait on `future` until it resolves, `cancellation` fires and then
/// `bound` elapses, or `bound` elapses without cancellation ever firing.
///
/// Returns `Some(output)` if `future` finished in time, `None` if the
/// caller should synthesize a cancellation result instead.
pub async fn race_against_cancellation<F, T>(
    future: F,
    cancellation: &CancellationToken,
    bound: Duration,
) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::pin!(future);
    tokio::select! {
        output = &mut future => Some(output),
        () = cancellation.cancelled() => {
            tokio::time::timeout(bound, future).await.ok()
        }
    }
}

/// Build the `InternalError` exception attached when the engine itself
/// gives up waiting past the cancellation bound (used only for logging;
/// the result itself carries no exception per spec).
#[must_use]
pub fn cancellation_timeout_exception(bound: Duration) -> BuildException {
    BuildException::new(
        ErrorKind::Cancellation,
        format!("request did not finalize within the {bound:?} cancellation bound"),
    )
}
