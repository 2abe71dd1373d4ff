//! Build results: per-target outcomes, merge semantics, and the overall
//! success/failure computation.

use std::collections::BTreeMap;

use crate::config::ConfigurationId;
use crate::error::{Error, Result};
use crate::names::CiString;
use crate::request::RequestedProjectState;

/// The outcome of running a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TargetResultCode {
    /// The target ran to completion without failure.
    Success,
    /// The target failed.
    Failure,
    /// The target was not run (already up to date, or condition false).
    Skipped,
}

/// Whether a failing target should stop the build or let it continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ActionCode {
    /// Continue building remaining targets despite the failure.
    Continue,
    /// Stop the build.
    Stop,
}

/// The combined result/action-code/exception triple a target or task
/// produces.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WorkUnitResult {
    /// The outcome code.
    pub result_code: TargetResultCode,
    /// Whether a failure should stop the build.
    pub action_code: ActionCode,
    /// The captured exception, if the unit failed with one.
    pub exception: Option<crate::error::BuildException>,
}

impl WorkUnitResult {
    /// A successful unit with no exception.
    #[must_use]
    pub fn success() -> Self {
        Self {
            result_code: TargetResultCode::Success,
            action_code: ActionCode::Continue,
            exception: None,
        }
    }

    /// A failing unit that stops the build, carrying `exception`.
    #[must_use]
    pub fn failure_stop(exception: crate::error::BuildException) -> Self {
        Self {
            result_code: TargetResultCode::Failure,
            action_code: ActionCode::Stop,
            exception: Some(exception),
        }
    }

    /// A skipped unit.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            result_code: TargetResultCode::Skipped,
            action_code: ActionCode::Continue,
            exception: None,
        }
    }
}

/// A single produced task item: its evaluated spec string plus metadata.
///
/// Metadata keys are name-insensitive.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskItem {
    /// The item's evaluated include spec.
    pub spec: String,
    /// Metadata name-value pairs.
    pub metadata: BTreeMap<String, String>,
}

impl TaskItem {
    /// Construct an item with no metadata.
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Look up metadata, ignoring case.
    #[must_use]
    pub fn metadatum(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The outcome of building a single target.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TargetResult {
    /// The final work-unit outcome for this target.
    pub work_unit_result: WorkUnitResult,
    /// Items produced by the target, in emission order.
    pub items: Vec<TaskItem>,
}

impl TargetResult {
    /// A successful target result with no produced items.
    #[must_use]
    pub fn success() -> Self {
        Self {
            work_unit_result: WorkUnitResult::success(),
            items: Vec::new(),
        }
    }

    /// Whether this target's outcome is [`TargetResultCode::Skipped`].
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.work_unit_result.result_code == TargetResultCode::Skipped
    }

    /// Whether this target failed in a way that should stop the build.
    #[must_use]
    pub fn stops_build(&self) -> bool {
        self.work_unit_result.result_code == TargetResultCode::Failure
            && self.work_unit_result.action_code == ActionCode::Stop
    }

    /// Whether `replacement` is at least as complete as `self` and so may
    /// overwrite it in an append-only `results_by_target` map: a concrete
    /// outcome may replace a prior `Skipped` entry, but nothing may
    /// overwrite an existing concrete outcome with a less complete one.
    #[must_use]
    fn may_be_replaced_by(&self, replacement: &Self) -> bool {
        self.is_skipped() && !replacement.is_skipped() || self == replacement
    }
}

/// The filtered, immutable snapshot of post-build project state a caller
/// asked to materialize.
///
/// Computed once at publication time; nothing mutates through a
/// [`BuildResult`] handle afterward.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectStateAfterBuild {
    /// The filter this snapshot was materialized with.
    pub filter: RequestedProjectState,
    /// Materialized property values.
    pub properties: BTreeMap<String, String>,
    /// Materialized items, keyed by item type.
    pub items: BTreeMap<String, Vec<TaskItem>>,
}

impl ProjectStateAfterBuild {
    fn merge_from(&mut self, other: &Self) {
        for (name, value) in &other.properties {
            self.properties.insert(name.clone(), value.clone());
        }
        for (item_type, items) in &other.items {
            self.items.entry(item_type.clone()).or_default();
            if let Some(existing) = self.items.get_mut(item_type) {
                for item in items {
                    if let Some(slot) = existing.iter_mut().find(|e| e.spec == item.spec) {
                        *slot = item.clone();
                    } else {
                        existing.push(item.clone());
                    }
                }
            }
        }
        self.filter = union_filter(&self.filter, &other.filter);
    }
}

fn union_filter(a: &RequestedProjectState, b: &RequestedProjectState) -> RequestedProjectState {
    let properties = match (&a.properties, &b.properties) {
        (None, _) | (_, None) => None,
        (Some(pa), Some(pb)) => Some(pa.union(pb).cloned().collect()),
    };
    let item_filters = match (&a.item_filters, &b.item_filters) {
        (None, _) | (_, None) => None,
        (Some(ia), Some(ib)) => {
            let mut merged = ia.clone();
            for (item_type, meta) in ib {
                merged
                    .entry(item_type.clone())
                    .and_modify(|existing| {
                        *existing = match (&existing, meta) {
                            (None, _) | (_, None) => None,
                            (Some(ea), Some(eb)) => Some(ea.union(eb).cloned().collect()),
                        };
                    })
                    .or_insert_with(|| meta.clone());
            }
            Some(merged)
        }
    };
    RequestedProjectState {
        properties,
        item_filters,
    }
}

/// The reply to a [`crate::request::BuildRequest`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BuildResult {
    /// The configuration this result was produced against.
    pub configuration_id: ConfigurationId,
    /// Global id of the request this result answers.
    pub global_request_id: Option<u64>,
    /// Global id of the parent request, or `None` if top-level.
    pub parent_global_request_id: Option<u64>,
    /// Node-local id of the request this result answers.
    pub node_request_id: u64,
    /// Submission this result belongs to.
    pub submission_id: u64,
    /// Per-target outcomes, keyed by target name (name-insensitive).
    pub results_by_target: BTreeMap<String, TargetResult>,
    /// Targets the project declares as its initial targets.
    pub initial_targets: Vec<String>,
    /// Targets the project declares as its default targets.
    pub default_targets: Vec<String>,
    /// Whether this result represents an unwound circular dependency.
    pub circular_dependency: bool,
    /// A captured exception that aborted the build, if any.
    pub exception: Option<crate::error::BuildException>,
    /// Filtered post-build project state, if the request asked for it.
    pub project_state_after_build: Option<ProjectStateAfterBuild>,
}

impl BuildResult {
    /// Construct an empty result for a configuration, with no targets yet.
    #[must_use]
    pub fn new(configuration_id: ConfigurationId, submission_id: u64, node_request_id: u64) -> Self {
        Self {
            configuration_id,
            global_request_id: None,
            parent_global_request_id: None,
            node_request_id,
            submission_id,
            results_by_target: BTreeMap::new(),
            initial_targets: Vec::new(),
            default_targets: Vec::new(),
            circular_dependency: false,
            exception: None,
            project_state_after_build: None,
        }
    }

    fn target_key<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.results_by_target
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Look up a target's result, ignoring case.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&TargetResult> {
        self.target_key(name)
            .and_then(|key| self.results_by_target.get(key))
    }

    /// Record (or overwrite, per append-only rules) a target's result.
    pub fn set_target(&mut self, name: impl Into<String>, result: TargetResult) {
        let name = name.into();
        if let Some(existing_key) = self.target_key(&name).map(str::to_string) {
            let existing = &self.results_by_target[&existing_key];
            if existing.may_be_replaced_by(&result) {
                self.results_by_target.insert(existing_key, result);
            }
        } else {
            self.results_by_target.insert(name, result);
        }
    }

    /// The overall success/failure of this result: failure iff some target
    /// has `Failure` with `Stop`; a `Skipped` target never flips this.
    #[must_use]
    pub fn overall_result(&self) -> TargetResultCode {
        if self.results_by_target.values().any(TargetResult::stops_build) {
            TargetResultCode::Failure
        } else {
            TargetResultCode::Success
        }
    }

    /// Merge `other` (a newer result for the same configuration) into
    /// `self` in place, per the rules:
    /// 1. union target results, concrete outcomes beat `Skipped`;
    /// 2. a new exception replaces a missing old one;
    /// 3. merging a different configuration is an error;
    /// 4. an empty-in-every-way `other` is a no-op;
    /// 5. post-build state snapshots merge, producing a superset filter.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        if self.configuration_id != other.configuration_id {
            return Err(Error::internal(format!(
                "cannot merge result for configuration {} into result for configuration {}",
                other.configuration_id, self.configuration_id
            )));
        }
        for (name, result) in &other.results_by_target {
            self.set_target(name.clone(), result.clone());
        }
        if other.exception.is_some() {
            self.exception = other.exception.clone();
        }
        if other.circular_dependency {
            self.circular_dependency = true;
        }
        if !other.initial_targets.is_empty() {
            self.initial_targets = other.initial_targets.clone();
        }
        if !other.default_targets.is_empty() {
            self.default_targets = other.default_targets.clone();
        }
        match (&mut self.project_state_after_build, &other.project_state_after_build) {
            (Some(existing), Some(incoming)) => existing.merge_from(incoming),
            (None, Some(incoming)) => self.project_state_after_build = Some(incoming.clone()),
            _ => {}
        }
        Ok(())
    }

    /// Restrict this result to the named targets, for answering a request
    /// that asked for a subset of what was cached.
    ///
    /// Returns `None` if any named target is missing from `self` (the
    /// caller maps that to an internal error: an "incomplete result").
    #[must_use]
    pub fn restricted_to(&self, targets: &[String]) -> Option<Self> {
        let mut restricted = self.clone();
        restricted.results_by_target.clear();
        for target in targets {
            let result = self.target(target)?;
            restricted.set_target(target.clone(), result.clone());
        }
        Some(restricted)
    }

    /// Whether every `name` in `targets` has an entry (case-insensitive).
    #[must_use]
    pub fn has_all_targets(&self, targets: &[String]) -> bool {
        targets.iter().all(|t| self.target(t).is_some())
    }
}

/// Case-insensitive comparison helper for target/item names shared outside
/// this module's `BTreeMap<String, _>` representation.
#[must_use]
pub fn names_equal(a: &str, b: &str) -> bool {
    CiString::new(a.to_string()) == CiString::new(b.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConfigurationId {
        ConfigurationId::new(1)
    }

    #[test]
    fn overall_result_is_failure_only_on_stop_failure() {
        let mut result = BuildResult::new(config(), 1, 1);
        result.set_target("Build", TargetResult::success());
        result.set_target(
            "Clean",
            TargetResult {
                work_unit_result: WorkUnitResult {
                    result_code: TargetResultCode::Failure,
                    action_code: ActionCode::Continue,
                    exception: None,
                },
                items: Vec::new(),
            },
        );
        assert_eq!(result.overall_result(), TargetResultCode::Success);

        result.set_target(
            "Pack",
            TargetResult {
                work_unit_result: WorkUnitResult::failure_stop(crate::error::BuildException::new(
                    crate::error::ErrorKind::TaskExecutionFailure,
                    "boom",
                )),
                items: Vec::new(),
            },
        );
        assert_eq!(result.overall_result(), TargetResultCode::Failure);
    }

    #[test]
    fn skipped_target_never_flips_overall_result() {
        let mut result = BuildResult::new(config(), 1, 1);
        result.set_target("Build", TargetResult {
            work_unit_result: WorkUnitResult::skipped(),
            items: Vec::new(),
        });
        assert_eq!(result.overall_result(), TargetResultCode::Success);
    }

    #[test]
    fn concrete_outcome_replaces_skipped_but_not_vice_versa() {
        let mut result = BuildResult::new(config(), 1, 1);
        result.set_target("Build", TargetResult {
            work_unit_result: WorkUnitResult::skipped(),
            items: Vec::new(),
        });
        result.set_target("Build", TargetResult::success());
        assert!(!result.target("Build").unwrap().is_skipped());

        result.set_target("Build", TargetResult {
            work_unit_result: WorkUnitResult::skipped(),
            items: Vec::new(),
        });
        assert!(!result.target("Build").unwrap().is_skipped());
    }

    #[test]
    fn merge_rejects_mismatched_configurations() {
        let mut a = BuildResult::new(ConfigurationId::new(1), 1, 1);
        let b = BuildResult::new(ConfigurationId::new(2), 1, 1);
        assert!(a.merge_from(&b).is_err());
    }

    #[test]
    fn merge_keeps_new_exception_over_missing_old_one() {
        let mut a = BuildResult::new(config(), 1, 1);
        let mut b = BuildResult::new(config(), 1, 1);
        b.exception = Some(crate::error::BuildException::new(
            crate::error::ErrorKind::InternalError,
            "oops",
        ));
        a.merge_from(&b).unwrap();
        assert!(a.exception.is_some());
    }

    #[test]
    fn merge_of_empty_result_is_a_no_op() {
        let mut a = BuildResult::new(config(), 1, 1);
        a.set_target("Build", TargetResult::success());
        let before = a.clone();
        a.merge_from(&BuildResult::new(config(), 1, 1)).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn restricted_to_returns_none_when_a_target_is_missing() {
        let mut result = BuildResult::new(config(), 1, 1);
        result.set_target("Build", TargetResult::success());
        assert!(result.restricted_to(&["Build".to_string(), "Clean".to_string()]).is_none());
        assert!(result.restricted_to(&["build".to_string()]).is_some());
    }
}
