//! Exit-code mapping from an overall build outcome to a process exit code,
//! per spec §6: `0` success, `1` user build failure, `2` unhandled internal
//! error.

use buildmux_core::error::ErrorKind;
use buildmux_core::result::{BuildResult, TargetResultCode};

/// Successful build.
pub const EXIT_OK: i32 = 0;
/// The build ran and produced a user-facing `Failure` overall result.
pub const EXIT_USER_FAILURE: i32 = 1;
/// An engine invariant was violated, or the build could not run at all.
pub const EXIT_INTERNAL_ERROR: i32 = 2;

/// Map a completed [`BuildResult`] to the process exit code a CLI session
/// should terminate with.
///
/// A captured exception whose kind is [`ErrorKind::InternalError`] always
/// maps to [`EXIT_INTERNAL_ERROR`] regardless of the per-target outcomes,
/// matching spec §7's "fatal to the submission" treatment; any other
/// overall `Failure` maps to [`EXIT_USER_FAILURE`].
#[must_use]
pub fn exit_code_for(result: &BuildResult) -> i32 {
    if let Some(exception) = &result.exception {
        if exception.kind == ErrorKind::InternalError {
            return EXIT_INTERNAL_ERROR;
        }
    }
    match result.overall_result() {
        TargetResultCode::Success => EXIT_OK,
        TargetResultCode::Failure | TargetResultCode::Skipped => EXIT_USER_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildmux_core::config::ConfigurationId;
    use buildmux_core::error::BuildException;
    use buildmux_core::result::{ActionCode, TargetResult, WorkUnitResult};

    fn base_result() -> BuildResult {
        BuildResult::new(ConfigurationId::new(1), 1, 1)
    }

    #[test]
    fn success_maps_to_zero() {
        let mut result = base_result();
        result.set_target("Build", TargetResult::success());
        assert_eq!(exit_code_for(&result), EXIT_OK);
    }

    #[test]
    fn stopping_failure_maps_to_one() {
        let mut result = base_result();
        let exception = BuildException::new(ErrorKind::TaskExecutionFailure, "task failed");
        result.set_target(
            "Build",
            TargetResult {
                work_unit_result: WorkUnitResult {
                    result_code: TargetResultCode::Failure,
                    action_code: ActionCode::Stop,
                    exception: Some(exception),
                },
                items: Vec::new(),
            },
        );
        assert_eq!(exit_code_for(&result), EXIT_USER_FAILURE);
    }

    #[test]
    fn internal_error_always_maps_to_two_even_without_failing_targets() {
        let mut result = base_result();
        result.set_target("Build", TargetResult::success());
        result.exception = Some(BuildException::new(ErrorKind::InternalError, "invariant violated"));
        assert_eq!(exit_code_for(&result), EXIT_INTERNAL_ERROR);
    }
}
