//! `Translatable` implementations for the shared data model
//! ([`buildmux_core`]) plus the handful of wire-only envelope types
//! (handshake, shutdown, submission-start) that only ever exist as packets.

use std::collections::{BTreeMap, BTreeSet};

use buildmux_core::request::BuildRequestFlags;
use buildmux_core::{
    ActionCode, BuildException, BuildRequest, BuildRequestConfiguration, BuildResult, ConfigurationId,
    Error as CoreError, ErrorKind, GlobalProperties, NodeConfiguration, ProjectInstance, ProjectStateAfterBuild,
    RequestedProjectState, TargetResult, TargetResultCode, TaskCompleteType, TaskHostConfiguration,
    TaskHostTaskComplete, TaskItem, TaskParameterValue, WorkUnitResult,
};

use crate::error::{Error, Result};
use crate::translator::{Translatable, Translator};

/// The canonical registered short name for each [`ErrorKind`], used for
/// exception `type_name` fallback classification on read.
#[must_use]
pub fn error_kind_type_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidProjectFile => "InvalidProjectFileException",
        ErrorKind::InternalError => "InternalErrorException",
        ErrorKind::TaskExecutionFailure => "TaskExecutionException",
        ErrorKind::TaskHostCrash => "TaskHostCrashException",
        ErrorKind::SerializationFailure => "SerializationException",
        ErrorKind::Cancellation => "BuildCancelledException",
    }
}

/// Every exception type name this workspace registers. A `type_name` read
/// off the wire that is not in this list falls back to
/// [`buildmux_core::GENERIC_RUNTIME_ERROR_TYPE`].
pub const KNOWN_EXCEPTION_TYPE_NAMES: &[&str] = &[
    buildmux_core::GENERIC_RUNTIME_ERROR_TYPE,
    "InvalidProjectFileException",
    "InternalErrorException",
    "TaskExecutionException",
    "TaskHostCrashException",
    "SerializationException",
    "BuildCancelledException",
];

fn error_kind_to_byte(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidProjectFile => 0,
        ErrorKind::InternalError => 1,
        ErrorKind::TaskExecutionFailure => 2,
        ErrorKind::TaskHostCrash => 3,
        ErrorKind::SerializationFailure => 4,
        ErrorKind::Cancellation => 5,
    }
}

fn error_kind_from_byte(byte: u8) -> Result<ErrorKind> {
    match byte {
        0 => Ok(ErrorKind::InvalidProjectFile),
        1 => Ok(ErrorKind::InternalError),
        2 => Ok(ErrorKind::TaskExecutionFailure),
        3 => Ok(ErrorKind::TaskHostCrash),
        4 => Ok(ErrorKind::SerializationFailure),
        5 => Ok(ErrorKind::Cancellation),
        other => Err(Error::malformed(format!("unknown ErrorKind byte: {other}"))),
    }
}

impl Translatable for ConfigurationId {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_i32(self.raw())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self::new(t.read_i32()?))
    }
}

impl Translatable for GlobalProperties {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        let pairs: Vec<(String, String)> = self.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        t.write_string_pairs(&pairs)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(t.read_string_pairs()?.into_iter().collect())
    }
}

impl Translatable for ProjectInstance {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_string_map(&self.properties)?;
        t.write_u32(u32::try_from(self.items.len()).unwrap_or(u32::MAX))?;
        for (item_type, specs) in &self.items {
            t.write_string(item_type)?;
            t.write_string_vec(specs)?;
        }
        Ok(())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let properties = t.read_string_map()?;
        let item_count = t.read_u32()?;
        let mut items = BTreeMap::new();
        for _ in 0..item_count {
            let item_type = t.read_string()?;
            let specs = t.read_string_vec()?;
            items.insert(item_type, specs);
        }
        Ok(Self { properties, items })
    }
}

impl Translatable for BuildRequestFlags {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u32(self.bits())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self::from_bits_truncate(t.read_u32()?))
    }
}

fn write_opt_string_set(t: &mut Translator<'_>, value: &Option<BTreeSet<String>>) -> Result<()> {
    t.write_bool(value.is_some())?;
    if let Some(set) = value {
        t.write_string_vec(&set.iter().cloned().collect::<Vec<_>>())?;
    }
    Ok(())
}

fn read_opt_string_set(t: &mut Translator<'_>) -> Result<Option<BTreeSet<String>>> {
    if t.read_bool()? {
        Ok(Some(t.read_string_vec()?.into_iter().collect()))
    } else {
        Ok(None)
    }
}

impl Translatable for RequestedProjectState {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        write_opt_string_set(t, &self.properties)?;
        t.write_bool(self.item_filters.is_some())?;
        if let Some(filters) = &self.item_filters {
            t.write_u32(u32::try_from(filters.len()).unwrap_or(u32::MAX))?;
            for (item_type, metadata) in filters {
                t.write_string(item_type)?;
                write_opt_string_set(t, metadata)?;
            }
        }
        Ok(())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let properties = read_opt_string_set(t)?;
        let item_filters = if t.read_bool()? {
            let len = t.read_u32()?;
            let mut map = BTreeMap::new();
            for _ in 0..len {
                let item_type = t.read_string()?;
                let metadata = read_opt_string_set(t)?;
                map.insert(item_type, metadata);
            }
            Some(map)
        } else {
            None
        };
        Ok(Self { properties, item_filters })
    }
}

impl Translatable for BuildRequestConfiguration {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write(&self.id)?;
        t.write_string(&self.project_full_path)?;
        t.write(&self.global_properties)?;
        t.write_string(&self.tools_version)?;
        t.write_opt(self.project_instance.as_ref())?;
        t.write_bool(self.is_cacheable)?;
        t.write_bool(self.is_loaded)?;
        t.write_bool(self.is_actively_building)?;
        t.write_bool(self.was_generated_by_node)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let id = t.read()?;
        let project_full_path = t.read_string()?;
        let global_properties = t.read()?;
        let tools_version = t.read_string()?;
        let project_instance = t.read_opt()?;
        let is_cacheable = t.read_bool()?;
        let is_loaded = t.read_bool()?;
        let is_actively_building = t.read_bool()?;
        let was_generated_by_node = t.read_bool()?;
        Ok(Self {
            id,
            project_full_path,
            global_properties,
            tools_version,
            project_instance,
            is_cacheable,
            is_loaded,
            is_actively_building,
            was_generated_by_node,
        })
    }
}

impl Translatable for BuildRequest {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u64(self.submission_id)?;
        t.write_u64(self.node_request_id)?;
        t.write_bool(self.global_request_id.is_some())?;
        if let Some(id) = self.global_request_id {
            t.write_u64(id)?;
        }
        t.write_bool(self.parent_global_request_id.is_some())?;
        if let Some(id) = self.parent_global_request_id {
            t.write_u64(id)?;
        }
        t.write(&self.configuration_id)?;
        t.write_string_vec(&self.targets)?;
        t.write(&self.flags)?;
        t.write_opt(self.requested_project_state.as_ref())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let submission_id = t.read_u64()?;
        let node_request_id = t.read_u64()?;
        let global_request_id = if t.read_bool()? { Some(t.read_u64()?) } else { None };
        let parent_global_request_id = if t.read_bool()? { Some(t.read_u64()?) } else { None };
        let configuration_id = t.read()?;
        let targets = t.read_string_vec()?;
        let flags = t.read()?;
        let requested_project_state = t.read_opt()?;
        Ok(Self {
            submission_id,
            node_request_id,
            global_request_id,
            parent_global_request_id,
            configuration_id,
            targets,
            flags,
            requested_project_state,
        })
    }
}

impl Translatable for BuildException {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u8(error_kind_to_byte(self.kind))?;
        t.write_string(&self.type_name)?;
        t.write_string(&self.message)?;
        t.write_opt_string(self.stack_trace.as_deref())?;
        t.write_bool(self.inner.is_some())?;
        if let Some(inner) = &self.inner {
            inner.write_to(t)?;
        }
        Ok(())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let kind = error_kind_from_byte(t.read_u8()?)?;
        let type_name = t.read_string()?;
        let message = t.read_string()?;
        let stack_trace = t.read_opt_string()?;
        let inner = if t.read_bool()? {
            Some(Box::new(Self::read_from(t)?))
        } else {
            None
        };
        let mut exception = Self {
            kind,
            type_name,
            message,
            stack_trace,
            inner,
        };
        exception.normalize_type_name(KNOWN_EXCEPTION_TYPE_NAMES);
        Ok(exception)
    }
}

fn target_result_code_to_byte(code: TargetResultCode) -> u8 {
    match code {
        TargetResultCode::Success => 0,
        TargetResultCode::Failure => 1,
        TargetResultCode::Skipped => 2,
    }
}

fn target_result_code_from_byte(byte: u8) -> Result<TargetResultCode> {
    match byte {
        0 => Ok(TargetResultCode::Success),
        1 => Ok(TargetResultCode::Failure),
        2 => Ok(TargetResultCode::Skipped),
        other => Err(Error::malformed(format!("unknown TargetResultCode byte: {other}"))),
    }
}

fn action_code_to_byte(code: ActionCode) -> u8 {
    match code {
        ActionCode::Continue => 0,
        ActionCode::Stop => 1,
    }
}

fn action_code_from_byte(byte: u8) -> Result<ActionCode> {
    match byte {
        0 => Ok(ActionCode::Continue),
        1 => Ok(ActionCode::Stop),
        other => Err(Error::malformed(format!("unknown ActionCode byte: {other}"))),
    }
}

impl Translatable for WorkUnitResult {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u8(target_result_code_to_byte(self.result_code))?;
        t.write_u8(action_code_to_byte(self.action_code))?;
        t.write_opt(self.exception.as_ref())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let result_code = target_result_code_from_byte(t.read_u8()?)?;
        let action_code = action_code_from_byte(t.read_u8()?)?;
        let exception = t.read_opt()?;
        Ok(Self {
            result_code,
            action_code,
            exception,
        })
    }
}

impl Translatable for TaskItem {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_string(&self.spec)?;
        t.write_string_map(&self.metadata)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let spec = t.read_string()?;
        let metadata = t.read_string_map()?;
        Ok(Self { spec, metadata })
    }
}

impl Translatable for TargetResult {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write(&self.work_unit_result)?;
        t.write_vec(&self.items)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let work_unit_result = t.read()?;
        let items = t.read_vec()?;
        Ok(Self { work_unit_result, items })
    }
}

impl Translatable for ProjectStateAfterBuild {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write(&self.filter)?;
        t.write_string_map(&self.properties)?;
        t.write_u32(u32::try_from(self.items.len()).unwrap_or(u32::MAX))?;
        for (item_type, items) in &self.items {
            t.write_string(item_type)?;
            t.write_vec(items)?;
        }
        Ok(())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let filter = t.read()?;
        let properties = t.read_string_map()?;
        let item_count = t.read_u32()?;
        let mut items = BTreeMap::new();
        for _ in 0..item_count {
            let item_type = t.read_string()?;
            let task_items = t.read_vec()?;
            items.insert(item_type, task_items);
        }
        Ok(Self {
            filter,
            properties,
            items,
        })
    }
}

/// `results_by_target` is carried as a `(name, TargetResult)` pair list
/// rather than relying on [`Translatable`] for `BTreeMap` generically, since
/// only this one map of non-primitive values appears in the data model.
impl Translatable for BuildResult {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write(&self.configuration_id)?;
        t.write_bool(self.global_request_id.is_some())?;
        if let Some(id) = self.global_request_id {
            t.write_u64(id)?;
        }
        t.write_bool(self.parent_global_request_id.is_some())?;
        if let Some(id) = self.parent_global_request_id {
            t.write_u64(id)?;
        }
        t.write_u64(self.node_request_id)?;
        t.write_u64(self.submission_id)?;
        t.write_u32(u32::try_from(self.results_by_target.len()).unwrap_or(u32::MAX))?;
        for (name, result) in &self.results_by_target {
            t.write_string(name)?;
            t.write(result)?;
        }
        t.write_string_vec(&self.initial_targets)?;
        t.write_string_vec(&self.default_targets)?;
        t.write_bool(self.circular_dependency)?;
        t.write_opt(self.exception.as_ref())?;
        t.write_opt(self.project_state_after_build.as_ref())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let configuration_id: ConfigurationId = t.read()?;
        let global_request_id = if t.read_bool()? { Some(t.read_u64()?) } else { None };
        let parent_global_request_id = if t.read_bool()? { Some(t.read_u64()?) } else { None };
        let node_request_id = t.read_u64()?;
        let submission_id = t.read_u64()?;
        let target_count = t.read_u32()?;
        let mut results_by_target = BTreeMap::new();
        for _ in 0..target_count {
            let name = t.read_string()?;
            let result: TargetResult = t.read()?;
            results_by_target.insert(name, result);
        }
        let initial_targets = t.read_string_vec()?;
        let default_targets = t.read_string_vec()?;
        let circular_dependency = t.read_bool()?;
        let exception: Option<BuildException> = t.read_opt()?;
        let project_state_after_build: Option<ProjectStateAfterBuild> = t.read_opt()?;
        Ok(Self {
            configuration_id,
            global_request_id,
            parent_global_request_id,
            node_request_id,
            submission_id,
            results_by_target,
            initial_targets,
            default_targets,
            circular_dependency,
            exception,
            project_state_after_build,
        })
    }
}

fn task_complete_type_to_byte(value: TaskCompleteType) -> u8 {
    match value {
        TaskCompleteType::Success => 0,
        TaskCompleteType::Failure => 1,
        TaskCompleteType::CrashedDuringInitialization => 2,
        TaskCompleteType::CrashedDuringExecution => 3,
    }
}

fn task_complete_type_from_byte(byte: u8) -> Result<TaskCompleteType> {
    match byte {
        0 => Ok(TaskCompleteType::Success),
        1 => Ok(TaskCompleteType::Failure),
        2 => Ok(TaskCompleteType::CrashedDuringInitialization),
        3 => Ok(TaskCompleteType::CrashedDuringExecution),
        other => Err(Error::malformed(format!("unknown TaskCompleteType byte: {other}"))),
    }
}

/// Tag byte for each [`TaskParameterValue`] variant. The translator
/// discriminates on this single byte rather than reflecting over a CLR type,
/// per the closed-world redesign spec §9 calls for.
fn parameter_value_tag(value: &TaskParameterValue) -> u8 {
    match value {
        TaskParameterValue::Bool(_) => 0,
        TaskParameterValue::Byte(_) => 1,
        TaskParameterValue::Short(_) => 2,
        TaskParameterValue::Int(_) => 3,
        TaskParameterValue::Long(_) => 4,
        TaskParameterValue::Double(_) => 5,
        TaskParameterValue::Decimal(_) => 6,
        TaskParameterValue::Char(_) => 7,
        TaskParameterValue::String(_) => 8,
        TaskParameterValue::DateTime(_) => 9,
        TaskParameterValue::TaskItem(_) => 10,
        TaskParameterValue::Array(_) => 11,
    }
}

impl Translatable for TaskParameterValue {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u8(parameter_value_tag(self))?;
        match self {
            Self::Bool(value) => t.write_bool(*value),
            Self::Byte(value) => t.write_u8(*value),
            Self::Short(value) => t.write_u16(u16::from_ne_bytes(value.to_ne_bytes())),
            Self::Int(value) => t.write_i32(*value),
            Self::Long(value) => t.write_i64(*value),
            Self::Double(value) => t.write_f64(*value),
            Self::Decimal(value) | Self::String(value) => t.write_string(value),
            Self::Char(value) => t.write_u32(u32::from(*value)),
            Self::DateTime(value) => t.write_i64(value.timestamp_micros()),
            Self::TaskItem(item) => t.write(item),
            Self::Array(values) => t.write_vec(values),
        }
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        match t.read_u8()? {
            0 => Ok(Self::Bool(t.read_bool()?)),
            1 => Ok(Self::Byte(t.read_u8()?)),
            2 => Ok(Self::Short(i16::from_ne_bytes(t.read_u16()?.to_ne_bytes()))),
            3 => Ok(Self::Int(t.read_i32()?)),
            4 => Ok(Self::Long(t.read_i64()?)),
            5 => Ok(Self::Double(t.read_f64()?)),
            6 => Ok(Self::Decimal(t.read_string()?)),
            7 => {
                let codepoint = t.read_u32()?;
                char::from_u32(codepoint)
                    .map(Self::Char)
                    .ok_or_else(|| Error::malformed(format!("invalid char codepoint: {codepoint}")))
            }
            8 => Ok(Self::String(t.read_string()?)),
            9 => {
                let micros = t.read_i64()?;
                chrono::DateTime::from_timestamp_micros(micros)
                    .map(Self::DateTime)
                    .ok_or_else(|| Error::malformed(format!("invalid DateTime microseconds: {micros}")))
            }
            10 => Ok(Self::TaskItem(t.read()?)),
            11 => Ok(Self::Array(t.read_vec()?)),
            other => Err(Error::malformed(format!("unknown TaskParameterValue tag: {other}"))),
        }
    }
}

fn write_parameter_pairs(t: &mut Translator<'_>, values: &[(String, TaskParameterValue)]) -> Result<()> {
    t.write_u32(u32::try_from(values.len()).unwrap_or(u32::MAX))?;
    for (key, value) in values {
        t.write_string(key)?;
        t.write(value)?;
    }
    Ok(())
}

fn read_parameter_pairs(t: &mut Translator<'_>) -> Result<Vec<(String, TaskParameterValue)>> {
    let len = t.read_u32()?;
    (0..len).map(|_| Ok((t.read_string()?, t.read()?))).collect()
}

fn write_parameter_map(t: &mut Translator<'_>, map: &BTreeMap<String, TaskParameterValue>) -> Result<()> {
    write_parameter_pairs(t, &map.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>())
}

fn read_parameter_map(t: &mut Translator<'_>) -> Result<BTreeMap<String, TaskParameterValue>> {
    Ok(read_parameter_pairs(t)?.into_iter().collect())
}

impl Translatable for TaskHostConfiguration {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_string(&self.task_name)?;
        t.write_string(&self.assembly_location)?;
        t.write(&self.global_properties)?;
        t.write_u32(self.line)?;
        t.write_u32(self.column)?;
        t.write_bool(self.continue_on_error)?;
        t.write_string(&self.culture)?;
        write_parameter_pairs(t, &self.parameters)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            task_name: t.read_string()?,
            assembly_location: t.read_string()?,
            global_properties: t.read()?,
            line: t.read_u32()?,
            column: t.read_u32()?,
            continue_on_error: t.read_bool()?,
            culture: t.read_string()?,
            parameters: read_parameter_pairs(t)?,
        })
    }
}

impl Translatable for TaskHostTaskComplete {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u8(task_complete_type_to_byte(self.complete_type))?;
        t.write_opt(self.exception.as_ref())?;
        t.write_opt_string(self.exception_message_resource_name.as_deref())?;
        t.write_bool(self.output_parameters.is_some())?;
        if let Some(outputs) = &self.output_parameters {
            write_parameter_map(t, outputs)?;
        }
        Ok(())
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        let complete_type = task_complete_type_from_byte(t.read_u8()?)?;
        let exception = t.read_opt()?;
        let exception_message_resource_name = t.read_opt_string()?;
        let output_parameters = if t.read_bool()? { Some(read_parameter_map(t)?) } else { None };
        let complete = Self {
            complete_type,
            exception,
            exception_message_resource_name,
            output_parameters,
        };
        complete
            .validate()
            .map_err(|e: CoreError| Error::malformed(e.to_string()))?;
        Ok(complete)
    }
}

impl Translatable for NodeConfiguration {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u32(self.node_id)?;
        t.write_u32(self.max_cpu_count)?;
        t.write_bool(self.supports_callbacks)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            node_id: t.read_u32()?,
            max_cpu_count: t.read_u32()?,
            supports_callbacks: t.read_bool()?,
        })
    }
}

/// A task-host-to-coordinator engine-service query (e.g. "are multiple nodes
/// running?", "grant me N CPU cores"), correlated by `request_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHostCallbackQueryRequest {
    /// Monotonically increasing id the host uses to match the response.
    pub request_id: u64,
    /// The engine-service query name.
    pub query: String,
    /// Stringified query arguments, in order.
    pub arguments: Vec<String>,
}

impl Translatable for TaskHostCallbackQueryRequest {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u64(self.request_id)?;
        t.write_string(&self.query)?;
        t.write_string_vec(&self.arguments)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            request_id: t.read_u64()?,
            query: t.read_string()?,
            arguments: t.read_string_vec()?,
        })
    }
}

/// The coordinator's reply to a [`TaskHostCallbackQueryRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHostCallbackQueryResponse {
    /// The `request_id` this reply answers.
    pub request_id: u64,
    /// Whether the coordinator actually serviced the call (`false` when
    /// callbacks are unsupported, per the opt-in gate).
    pub supported: bool,
    /// The stringified result value.
    pub result: String,
}

impl Translatable for TaskHostCallbackQueryResponse {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u64(self.request_id)?;
        t.write_bool(self.supported)?;
        t.write_string(&self.result)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            request_id: t.read_u64()?,
            supported: t.read_bool()?,
            result: t.read_string()?,
        })
    }
}

/// A task-host-to-coordinator request for a shared resource (e.g. additional
/// CPU core grants).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHostCallbackResourceRequest {
    /// Monotonically increasing id the host uses to match the response.
    pub request_id: u64,
    /// The resource kind being requested (e.g. `"cpu_cores"`).
    pub resource: String,
    /// The amount requested.
    pub amount: u32,
}

impl Translatable for TaskHostCallbackResourceRequest {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u64(self.request_id)?;
        t.write_string(&self.resource)?;
        t.write_u32(self.amount)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            request_id: t.read_u64()?,
            resource: t.read_string()?,
            amount: t.read_u32()?,
        })
    }
}

/// The coordinator's reply to a [`TaskHostCallbackResourceRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHostCallbackResourceResponse {
    /// The `request_id` this reply answers.
    pub request_id: u64,
    /// Whether the coordinator actually serviced the call.
    pub supported: bool,
    /// The amount actually granted (always `>= 1` when `supported` and the
    /// caller already holds the implicit core, per the resource model).
    pub granted: u32,
}

impl Translatable for TaskHostCallbackResourceResponse {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u64(self.request_id)?;
        t.write_bool(self.supported)?;
        t.write_u32(self.granted)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            request_id: t.read_u64()?,
            supported: t.read_bool()?,
            granted: t.read_u32()?,
        })
    }
}

/// Tells a worker node to shut down once its current work drains.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeShutdown {
    /// Human-readable shutdown reason, for logging.
    pub reason: String,
}

impl Translatable for NodeShutdown {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_string(&self.reason)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            reason: t.read_string()?,
        })
    }
}

/// A top-level build submission was admitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSubmissionStarted {
    /// The freshly assigned submission id.
    pub submission_id: u64,
    /// Targets requested for this submission.
    pub targets: Vec<String>,
}

impl Translatable for BuildSubmissionStarted {
    fn write_to(&self, t: &mut Translator<'_>) -> Result<()> {
        t.write_u64(self.submission_id)?;
        t.write_string_vec(&self.targets)
    }

    fn read_from(t: &mut Translator<'_>) -> Result<Self> {
        Ok(Self {
            submission_id: t.read_u64()?,
            targets: t.read_string_vec()?,
        })
    }
}
