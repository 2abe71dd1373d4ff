//! A minimal in-process [`TargetBuilder`] used to drive the engine from the
//! command line without a real project evaluator.
//!
//! Project evaluation and target execution are explicit external
//! collaborator boundaries (spec §1); this demo implementation stands in
//! for both so `buildmux build` has something concrete to run end to end.
//! A target named `fail` produces a stopping failure, one named `skip` is
//! reported `Skipped`, and every other target succeeds with a single item
//! named after the target.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use buildmux_core::config::BuildRequestConfiguration;
use buildmux_core::error::{BuildException, ErrorKind};
use buildmux_core::request::BuildRequest;
use buildmux_core::result::{ActionCode, BuildResult, TargetResult, TaskItem, WorkUnitResult};
use buildmux_core::target_builder::{TargetBuilder, TargetBuilderOutcome};

/// Synchronously resolves every requested target against fixed rules; never
/// suspends, so it always returns [`TargetBuilderOutcome::Complete`].
#[derive(Debug, Default)]
pub struct DemoTargetBuilder;

#[async_trait]
impl TargetBuilder for DemoTargetBuilder {
    async fn build(
        &self,
        configuration: &BuildRequestConfiguration,
        request: &BuildRequest,
        cancellation: &CancellationToken,
    ) -> TargetBuilderOutcome {
        let mut result = BuildResult::new(configuration.id, request.submission_id, request.node_request_id);
        result.parent_global_request_id = request.parent_global_request_id;
        result.global_request_id = request.global_request_id;

        for target in &request.targets {
            if cancellation.is_cancelled() {
                let exception = BuildException::new(ErrorKind::Cancellation, "build was cancelled");
                result.set_target(
                    target,
                    TargetResult {
                        work_unit_result: WorkUnitResult {
                            result_code: buildmux_core::result::TargetResultCode::Failure,
                            action_code: ActionCode::Stop,
                            exception: Some(exception),
                        },
                        items: Vec::new(),
                    },
                );
                break;
            }

            let outcome = if target.eq_ignore_ascii_case("fail") {
                let exception = BuildException::new(ErrorKind::TaskExecutionFailure, "demo target 'fail' always fails");
                TargetResult {
                    work_unit_result: WorkUnitResult::failure_stop(exception),
                    items: Vec::new(),
                }
            } else if target.eq_ignore_ascii_case("skip") {
                TargetResult {
                    work_unit_result: WorkUnitResult::skipped(),
                    items: Vec::new(),
                }
            } else {
                TargetResult {
                    work_unit_result: WorkUnitResult::success(),
                    items: vec![TaskItem::new(target.clone())],
                }
            };

            let stops = outcome.stops_build();
            result.set_target(target, outcome);
            if stops {
                break;
            }
        }

        TargetBuilderOutcome::Complete(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildmux_core::names::GlobalProperties;

    fn configuration() -> BuildRequestConfiguration {
        let mut config = BuildRequestConfiguration::new("/app.proj", GlobalProperties::new(), "current");
        config.id = buildmux_core::ConfigurationId::new(1);
        config
    }

    #[tokio::test]
    async fn succeeds_on_ordinary_targets() {
        let config = configuration();
        let request = BuildRequest::new_top_level(1, 1, config.id, vec!["Build".to_string()]);
        let outcome = DemoTargetBuilder.build(&config, &request, &CancellationToken::new()).await;
        let TargetBuilderOutcome::Complete(result) = outcome else {
            panic!("demo builder never suspends");
        };
        assert_eq!(
            result.target("Build").unwrap().work_unit_result.result_code,
            buildmux_core::result::TargetResultCode::Success
        );
    }

    #[tokio::test]
    async fn fail_target_stops_remaining_targets() {
        let config = configuration();
        let request = BuildRequest::new_top_level(1, 1, config.id, vec!["fail".to_string(), "Build".to_string()]);
        let outcome = DemoTargetBuilder.build(&config, &request, &CancellationToken::new()).await;
        let TargetBuilderOutcome::Complete(result) = outcome else {
            panic!("demo builder never suspends");
        };
        assert_eq!(result.overall_result(), buildmux_core::result::TargetResultCode::Failure);
        assert!(result.target("Build").is_none());
    }

    #[tokio::test]
    async fn skip_target_does_not_flip_overall_result() {
        let config = configuration();
        let request = BuildRequest::new_top_level(1, 1, config.id, vec!["skip".to_string()]);
        let outcome = DemoTargetBuilder.build(&config, &request, &CancellationToken::new()).await;
        let TargetBuilderOutcome::Complete(result) = outcome else {
            panic!("demo builder never suspends");
        };
        assert_eq!(result.overall_result(), buildmux_core::result::TargetResultCode::Success);
        assert!(result.target("skip").unwrap().is_skipped());
    }
}
