//! Build requests and the filters describing post-build project state.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ConfigurationId;
use crate::names::CiString;

bitflags::bitflags! {
    /// Per-request behavior toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct BuildRequestFlags: u32 {
        /// Replace any already-attached `ProjectInstance` with a fresh one.
        const REPLACE_EXISTING_PROJECT_INSTANCE = 1 << 0;
        /// Materialize the full post-build project state on the result.
        const PROVIDE_PROJECT_STATE_AFTER_BUILD = 1 << 1;
        /// Materialize a filtered subset of post-build project state; requires
        /// a non-null [`RequestedProjectState`] on the request.
        const PROVIDE_SUBSET_OF_STATE_AFTER_BUILD = 1 << 2;
        /// Clear caches once this build completes.
        const CLEAR_CACHES_AFTER_BUILD = 1 << 3;
        /// Silently drop targets that do not exist instead of failing.
        const SKIP_NONEXISTENT_TARGETS = 1 << 4;
        /// Tolerate missing, empty, or invalid `Import` elements.
        const IGNORE_MISSING_EMPTY_AND_INVALID_IMPORTS = 1 << 5;
        /// Fail the build if an SDK reference cannot be resolved.
        const FAIL_ON_UNRESOLVED_SDK = 1 << 6;
    }
}

impl Default for BuildRequestFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A filter describing which post-build properties and item/metadata to
/// materialize into a [`crate::result::ProjectStateAfterBuild`].
///
/// `None` for either field means "all" (and is a superset of any concrete
/// filter); `Some(empty set)` means "none" (a subset of any other filter).
/// See [`Self::is_subset_of`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestedProjectState {
    /// Property names to materialize, or `None` for all properties.
    pub properties: Option<BTreeSet<String>>,
    /// Per item-type, the metadata names to materialize (inner `None` =
    /// all metadata for that item type). Outer `None` means every item
    /// type; `Some(map)` restricts materialization to the named types.
    pub item_filters: Option<BTreeMap<String, Option<BTreeSet<String>>>>,
}

fn set_is_subset(a: &Option<BTreeSet<String>>, b: &Option<BTreeSet<String>>) -> bool {
    match (a, b) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => a.iter().map(|s| CiString::new(s.clone())).all(|s| {
            b.iter().any(|other| CiString::new(other.clone()) == s)
        }),
    }
}

impl RequestedProjectState {
    /// Everything: no property or item-metadata restriction.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether `self` asks for no more than `other` already provides: every
    /// property `self` names is named by `other` (or `other` wants all), and
    /// per item-type, `self`'s metadata filter is a subset of `other`'s.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        if !set_is_subset(&self.properties, &other.properties) {
            return false;
        }
        match (&self.item_filters, &other.item_filters) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(self_map), Some(other_map)) => self_map.iter().all(|(item_type, self_meta)| {
                let Some(other_meta) = find_ci(other_map, item_type) else {
                    return false;
                };
                set_is_subset(self_meta, other_meta)
            }),
        }
    }
}

fn find_ci<'a>(
    map: &'a BTreeMap<String, Option<BTreeSet<String>>>,
    name: &str,
) -> Option<&'a Option<BTreeSet<String>>> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// A demand for one configuration's targets to be built.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Groups every request issued from one top-level submission.
    pub submission_id: u64,
    /// Monotone id local to the node that created this request.
    pub node_request_id: u64,
    /// Global id assigned by the central engine; equal values denote
    /// identical requests. [`None`] until the engine assigns one.
    pub global_request_id: Option<u64>,
    /// The caller's global request id, or `None` if this is top-level.
    pub parent_global_request_id: Option<u64>,
    /// The configuration to build against.
    pub configuration_id: ConfigurationId,
    /// Target names to build, in order; comparisons are name-insensitive.
    pub targets: Vec<String>,
    /// Behavior toggles for this request.
    pub flags: BuildRequestFlags,
    /// Filter describing desired post-build project state, if any.
    pub requested_project_state: Option<RequestedProjectState>,
}

impl BuildRequest {
    /// Construct a new, not-yet-routed top-level request.
    #[must_use]
    pub fn new_top_level(
        submission_id: u64,
        node_request_id: u64,
        configuration_id: ConfigurationId,
        targets: Vec<String>,
    ) -> Self {
        Self {
            submission_id,
            node_request_id,
            global_request_id: None,
            parent_global_request_id: None,
            configuration_id,
            targets,
            flags: BuildRequestFlags::default(),
            requested_project_state: None,
        }
    }

    /// Whether this request names `target` (case-insensitive).
    #[must_use]
    pub fn wants_target(&self, target: &str) -> bool {
        self.targets.iter().any(|t| t.eq_ignore_ascii_case(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(properties: Option<&[&str]>, items: Option<&[(&str, Option<&[&str]>)]>) -> RequestedProjectState {
        RequestedProjectState {
            properties: properties.map(|p| p.iter().map(|s| (*s).to_string()).collect()),
            item_filters: items.map(|items| {
                items
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.map(|m| m.iter().map(|s| (*s).to_string()).collect())))
                    .collect()
            }),
        }
    }

    #[test]
    fn none_properties_is_superset_of_any_concrete_filter() {
        let narrow = filter(Some(&["A"]), Some(&[]));
        let wide = filter(None, Some(&[]));
        assert!(narrow.is_subset_of(&wide));
        assert!(!wide.is_subset_of(&narrow));
    }

    #[test]
    fn empty_item_metadata_is_subset_of_any_other_list() {
        let narrow = filter(None, Some(&[("Compile", Some(&[]))]));
        let wide = filter(None, Some(&[("Compile", Some(&["Link"]))]));
        assert!(narrow.is_subset_of(&wide));
    }

    #[test]
    fn missing_item_type_in_other_breaks_subset() {
        let narrow = filter(None, Some(&[("Compile", None)]));
        let wide = filter(None, Some(&[("Reference", None)]));
        assert!(!narrow.is_subset_of(&wide));
    }

    #[test]
    fn item_type_comparison_is_case_insensitive() {
        let narrow = filter(None, Some(&[("compile", Some(&["link"]))]));
        let wide = filter(None, Some(&[("Compile", Some(&["Link", "Other"]))]));
        assert!(narrow.is_subset_of(&wide));
    }

    #[test]
    fn none_item_filters_is_superset_of_any_concrete_item_filter() {
        let narrow = filter(None, Some(&[("Compile", None)]));
        let wide = filter(None, None);
        assert!(narrow.is_subset_of(&wide));
        assert!(!wide.is_subset_of(&narrow));
    }

    #[test]
    fn wants_target_is_case_insensitive() {
        let request = BuildRequest::new_top_level(1, 1, ConfigurationId::new(1), vec!["Build".to_string()]);
        assert!(request.wants_target("BUILD"));
        assert!(!request.wants_target("Clean"));
    }
}
