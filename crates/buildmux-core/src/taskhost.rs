//! Data types shared between the out-of-process task host and the
//! coordinator that spawns it.

use std::collections::BTreeMap;

use crate::error::{BuildException, Error, ErrorKind, Result};
use crate::names::GlobalProperties;
use crate::result::TaskItem;

/// A task parameter or output value, replacing a dynamic string-keyed
/// dictionary with a closed sum type the translator can discriminate on a
/// single tag byte. Task parameters in the source system can carry any of
/// these primitive CLR types, a project item, or an array of any of them.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TaskParameterValue {
    /// `System.Boolean`.
    Bool(bool),
    /// `System.Byte`.
    Byte(u8),
    /// `System.Int16`.
    Short(i16),
    /// `System.Int32`.
    Int(i32),
    /// `System.Int64`.
    Long(i64),
    /// `System.Double`.
    Double(f64),
    /// `System.Decimal`, carried as its canonical decimal-literal text
    /// rather than a parsed bignum — no scenario here does decimal
    /// arithmetic, only round-trip, so the text form is exact and needs no
    /// extra dependency.
    Decimal(String),
    /// `System.Char`.
    Char(char),
    /// `System.String`.
    String(String),
    /// `System.DateTime`.
    DateTime(chrono::DateTime<chrono::Utc>),
    /// A single evaluated project item.
    TaskItem(TaskItem),
    /// A homogeneous-or-not array of parameter values.
    Array(Vec<TaskParameterValue>),
}

/// How a task reported it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskCompleteType {
    /// The task ran and succeeded.
    Success,
    /// The task ran and reported failure.
    Failure,
    /// The host process crashed before the task could start.
    CrashedDuringInitialization,
    /// The host process crashed while the task was running.
    CrashedDuringExecution,
}

impl TaskCompleteType {
    fn is_crash(self) -> bool {
        matches!(
            self,
            Self::CrashedDuringInitialization | Self::CrashedDuringExecution
        )
    }
}

/// The packet handed to a freshly spawned task host process describing the
/// task to run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskHostConfiguration {
    /// Name of the task to invoke.
    pub task_name: String,
    /// Location of the assembly/module implementing the task.
    pub assembly_location: String,
    /// Global properties of the owning configuration.
    pub global_properties: GlobalProperties,
    /// Source line the task invocation appears at.
    pub line: u32,
    /// Source column the task invocation appears at.
    pub column: u32,
    /// Whether a task failure should let the build continue.
    pub continue_on_error: bool,
    /// Culture identifier for locale-sensitive task behavior.
    pub culture: String,
    /// Input parameters, in declaration order.
    pub parameters: Vec<(String, TaskParameterValue)>,
}

/// The packet a task host sends back once a task finishes (or crashes).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskHostTaskComplete {
    /// How the task finished.
    pub complete_type: TaskCompleteType,
    /// The captured exception, for a crash that carries one.
    pub exception: Option<BuildException>,
    /// A resource name identifying the crash reason, as an alternative to
    /// an inline exception.
    pub exception_message_resource_name: Option<String>,
    /// Output parameters the task produced, if it succeeded.
    pub output_parameters: Option<BTreeMap<String, TaskParameterValue>>,
}

impl TaskHostTaskComplete {
    /// Validate the mutual-exclusion rules between `complete_type` and the
    /// exception fields.
    ///
    /// `CrashedDuringInitialization`/`CrashedDuringExecution` must carry
    /// exactly one of `exception` or `exception_message_resource_name`;
    /// `Success`/`Failure` must carry neither.
    pub fn validate(&self) -> Result<()> {
        let has_exception = self.exception.is_some();
        let has_resource_name = self.exception_message_resource_name.is_some();

        if self.complete_type.is_crash() {
            if has_exception == has_resource_name {
                return Err(Error::internal(
                    "a crash completion must carry exactly one of exception or exception_message_resource_name",
                ));
            }
        } else if has_exception || has_resource_name {
            return Err(Error::internal(
                "Success/Failure completions must not carry an exception",
            ));
        }
        Ok(())
    }

    /// Build the [`BuildException`] this completion should surface on the
    /// owning target's result, if any.
    #[must_use]
    pub fn into_exception(self) -> Option<BuildException> {
        if let Some(exception) = self.exception {
            return Some(exception);
        }
        self.exception_message_resource_name
            .map(|resource| BuildException::new(ErrorKind::TaskHostCrash, resource))
    }
}

/// Handshake information a node advertises when it comes online.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeConfiguration {
    /// Unique id of this node within the build.
    pub node_id: u32,
    /// Maximum concurrent target builders this node will run.
    pub max_cpu_count: u32,
    /// Whether this node's coordinator supports task-host callbacks.
    pub supports_callbacks: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crash_without_exception_or_resource_name_is_invalid() {
        let complete = TaskHostTaskComplete {
            complete_type: TaskCompleteType::CrashedDuringExecution,
            exception: None,
            exception_message_resource_name: None,
            output_parameters: None,
        };
        assert!(complete.validate().is_err());
    }

    #[test]
    fn crash_with_both_exception_and_resource_name_is_invalid() {
        let complete = TaskHostTaskComplete {
            complete_type: TaskCompleteType::CrashedDuringInitialization,
            exception: Some(BuildException::new(ErrorKind::TaskHostCrash, "boom")),
            exception_message_resource_name: Some("SomeResource".to_string()),
            output_parameters: None,
        };
        assert!(complete.validate().is_err());
    }

    #[test]
    fn crash_with_exactly_one_cause_is_valid() {
        let complete = TaskHostTaskComplete {
            complete_type: TaskCompleteType::CrashedDuringInitialization,
            exception: None,
            exception_message_resource_name: Some("SomeResource".to_string()),
            output_parameters: None,
        };
        assert!(complete.validate().is_ok());
    }

    #[test]
    fn success_with_exception_is_invalid() {
        let complete = TaskHostTaskComplete {
            complete_type: TaskCompleteType::Success,
            exception: Some(BuildException::new(ErrorKind::TaskExecutionFailure, "boom")),
            exception_message_resource_name: None,
            output_parameters: None,
        };
        assert!(complete.validate().is_err());
    }

    #[test]
    fn success_with_output_parameters_is_valid() {
        let mut outputs = BTreeMap::new();
        outputs.insert("Result".to_string(), TaskParameterValue::Int(42));
        let complete = TaskHostTaskComplete {
            complete_type: TaskCompleteType::Success,
            exception: None,
            exception_message_resource_name: None,
            output_parameters: Some(outputs),
        };
        assert!(complete.validate().is_ok());
    }

    #[test]
    fn array_parameter_value_nests_other_variants() {
        let value = TaskParameterValue::Array(vec![
            TaskParameterValue::String("a.c".to_string()),
            TaskParameterValue::TaskItem(TaskItem::new("b.c")),
        ]);
        match value {
            TaskParameterValue::Array(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected an array"),
        }
    }
}
