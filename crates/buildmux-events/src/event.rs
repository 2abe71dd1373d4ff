//! The `BuildEvent` union shared by every component that emits build telemetry.
//!
//! Each variant carries the fixed field list the wire protocol round-trips.
//! This type is deliberately a plain, serde-friendly enum: `buildmux-proto`
//! owns binary translation, this crate only owns the event *shape* and its
//! severity classification for renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity bucket used by CLI/JSON renderers to decide formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Informational progress.
    Message,
    /// Recoverable problem worth surfacing.
    Warning,
    /// A build-affecting error.
    Error,
    /// An error that always surfaces regardless of verbosity.
    Critical,
}

/// The full `LogMessage` union from spec §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildEvent {
    /// The overall build started.
    BuildStarted {
        /// Wall-clock start time.
        timestamp: DateTime<Utc>,
    },
    /// The overall build finished.
    BuildFinished {
        /// Wall-clock finish time.
        timestamp: DateTime<Utc>,
        /// Whether the overall build succeeded.
        succeeded: bool,
    },
    /// A project evaluation/build started.
    ProjectStarted {
        /// Full path of the project.
        project_file: String,
        /// Targets requested for this project.
        targets_to_build: Vec<String>,
    },
    /// A project evaluation/build finished.
    ProjectFinished {
        /// Full path of the project.
        project_file: String,
        /// Whether the project build succeeded.
        succeeded: bool,
    },
    /// A target started executing.
    TargetStarted {
        /// Target name.
        target_name: String,
        /// Project that owns the target.
        project_file: String,
    },
    /// A target finished executing.
    TargetFinished {
        /// Target name.
        target_name: String,
        /// Project that owns the target.
        project_file: String,
        /// Whether the target succeeded.
        succeeded: bool,
    },
    /// A target was skipped (already up to date, or condition false).
    TargetSkipped {
        /// Target name.
        target_name: String,
        /// Human-readable reason for the skip.
        reason: String,
    },
    /// A task started.
    TaskStarted {
        /// Task name.
        task_name: String,
        /// Target that owns the task.
        target_name: String,
    },
    /// A task finished.
    TaskFinished {
        /// Task name.
        task_name: String,
        /// Whether the task succeeded.
        succeeded: bool,
    },
    /// The exact command line used to invoke a task (e.g. an external tool).
    TaskCommandLine {
        /// The rendered command line.
        command_line: String,
        /// Task name.
        task_name: String,
    },
    /// A single resolved task parameter, logged for diagnostics.
    TaskParameter {
        /// Parameter name.
        name: String,
        /// Rendered parameter value.
        value: String,
    },
    /// A plain informational build message.
    BuildMessage {
        /// Message text.
        message: String,
        /// Severity as chosen by the emitter (importance).
        severity: EventSeverity,
    },
    /// A build warning.
    BuildWarning {
        /// Stable warning code (e.g. `E-...`), if any.
        code: Option<String>,
        /// Message text.
        message: String,
    },
    /// A build error.
    BuildError {
        /// Stable error code (e.g. `E-...`), if any.
        code: Option<String>,
        /// Message text.
        message: String,
    },
    /// A message that must surface even at reduced verbosity.
    CriticalBuildMessage {
        /// Message text.
        message: String,
    },
    /// An extended (structured, code-carrying) error.
    ExtendedError {
        /// Stable error code.
        code: String,
        /// Message text.
        message: String,
    },
    /// An extended warning.
    ExtendedWarning {
        /// Stable warning code.
        code: String,
        /// Message text.
        message: String,
    },
    /// An extended informational message.
    ExtendedMessage {
        /// Message text.
        message: String,
    },
    /// An extended custom event carrying an arbitrary JSON payload.
    ExtendedCustom {
        /// Event type name chosen by the emitter.
        event_type: String,
        /// Arbitrary structured payload.
        payload: serde_json::Value,
    },
    /// An extended critical message.
    ExtendedCriticalMessage {
        /// Message text.
        message: String,
    },
    /// A response file was expanded during command-line construction.
    ResponseFileUsed {
        /// Path to the response file.
        path: String,
    },
    /// A property was read before it had ever been assigned.
    UninitializedPropertyRead {
        /// Property name.
        property_name: String,
    },
    /// An environment variable was read during evaluation.
    EnvironmentVariableRead {
        /// Variable name.
        name: String,
        /// Value observed (subject to redaction before rendering).
        value: String,
    },
    /// A property was assigned a new value, overwriting a prior one.
    PropertyReassignment {
        /// Property name.
        property_name: String,
        /// Previous value.
        previous_value: String,
        /// New value.
        new_value: String,
    },
    /// The first value ever assigned to a property.
    PropertyInitialValueSet {
        /// Property name.
        property_name: String,
        /// Initial value.
        value: String,
    },
    /// A metaproject (synthetic project) was generated.
    MetaprojectGenerated {
        /// Path of the generated project.
        path: String,
    },
    /// A generated file was used as an input.
    GeneratedFileUsed {
        /// Path of the generated file.
        path: String,
    },
    /// Project evaluation started.
    ProjectEvaluationStarted {
        /// Full path of the project.
        project_file: String,
    },
    /// Project evaluation finished.
    ProjectEvaluationFinished {
        /// Full path of the project.
        project_file: String,
    },
    /// An assembly (plugin/task library) was loaded.
    AssemblyLoad {
        /// Assembly name or path.
        name: String,
    },
    /// A top-level build submission was admitted.
    BuildSubmissionStarted {
        /// Submission identifier.
        submission_id: u32,
        /// Targets requested.
        targets: Vec<String>,
    },
    /// The build was canceled.
    BuildCanceled {
        /// Human-readable reason.
        reason: String,
    },
    /// Periodic telemetry describing a worker node's health.
    WorkerNodeTelemetry {
        /// Node identifier.
        node_id: u32,
        /// Number of active request builders on the node.
        active_requests: u32,
        /// Configured CPU concurrency ceiling.
        max_cpu_count: u32,
    },
}

impl BuildEvent {
    /// Classify this event's severity for renderer formatting.
    #[must_use]
    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::BuildError { .. }
            | Self::ExtendedError { .. }
            | Self::TargetFinished {
                succeeded: false, ..
            }
            | Self::TaskFinished {
                succeeded: false, ..
            } => EventSeverity::Error,
            Self::BuildWarning { .. } | Self::ExtendedWarning { .. } => EventSeverity::Warning,
            Self::CriticalBuildMessage { .. } | Self::ExtendedCriticalMessage { .. } => {
                EventSeverity::Critical
            }
            Self::BuildMessage { severity, .. } => *severity,
            _ => EventSeverity::Message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_classification() {
        let err = BuildEvent::BuildError {
            code: Some("E-TEST".into()),
            message: "boom".into(),
        };
        assert_eq!(err.severity(), EventSeverity::Error);

        let skipped = BuildEvent::TargetSkipped {
            target_name: "foo".into(),
            reason: "up to date".into(),
        };
        assert_eq!(skipped.severity(), EventSeverity::Message);
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = BuildEvent::TaskParameter {
            name: "Sources".into(),
            value: "a.c;b.c".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BuildEvent = serde_json::from_str(&json).unwrap();
        match back {
            BuildEvent::TaskParameter { name, value } => {
                assert_eq!(name, "Sources");
                assert_eq!(value, "a.c;b.c");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
