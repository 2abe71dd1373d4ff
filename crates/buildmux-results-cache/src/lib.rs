//! Map from [`ConfigurationId`] to the merged [`BuildResult`] accumulated
//! for it, with request-subset satisfaction.

pub mod error;

use std::collections::HashMap;
use std::sync::RwLock;

use buildmux_core::request::BuildRequestFlags;
use buildmux_core::{BuildRequest, BuildResult, ConfigurationId};

pub use error::{Error, Result};

/// The outcome of checking whether a cached result already answers a
/// request without rebuilding.
#[derive(Debug, Clone)]
pub enum SatisfyResponse {
    /// The cache already holds everything the request asked for.
    Satisfied(BuildResult),
    /// The cache cannot answer the request as-is; it must be (re)built.
    NotSatisfied,
}

/// Process-wide cache of merged build results, keyed by configuration.
#[derive(Default)]
pub struct ResultsCache {
    results: RwLock<HashMap<ConfigurationId, BuildResult>>,
}

impl ResultsCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result`, merging it into any existing result for the same
    /// configuration per the documented merge rules. An empty result (no
    /// targets, no exception, no state snapshot) merged against an
    /// existing entry is a no-op.
    pub fn add(&self, result: BuildResult) -> Result<()> {
        let mut results = self.results.write().unwrap_or_else(|e| e.into_inner());
        match results.get_mut(&result.configuration_id) {
            Some(existing) => existing
                .merge_from(&result)
                .map_err(|e| Error::internal(e.to_string())),
            None => {
                results.insert(result.configuration_id, result);
                Ok(())
            }
        }
    }

    /// The raw, merged result for a configuration, if any.
    #[must_use]
    pub fn get_result_for_configuration(&self, id: ConfigurationId) -> Option<BuildResult> {
        self.results.read().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
    }

    /// The cached result restricted to `request`'s targets.
    ///
    /// Returns `Ok(None)` if the configuration has no cached result at
    /// all; fails with [`Error::IncompleteResult`] if the configuration is
    /// present but some requested target has no entry.
    pub fn get_result_for_request(&self, request: &BuildRequest) -> Result<Option<BuildResult>> {
        let Some(stored) = self.get_result_for_configuration(request.configuration_id) else {
            return Ok(None);
        };
        match stored.restricted_to(&request.targets) {
            Some(restricted) => Ok(Some(restricted)),
            None => {
                let missing = request
                    .targets
                    .iter()
                    .find(|t| stored.target(t).is_none())
                    .cloned()
                    .unwrap_or_default();
                Err(Error::incomplete_result(request.configuration_id.raw(), missing))
            }
        }
    }

    /// Check whether the cache can already answer `request` for
    /// `requested_targets`, without rebuilding.
    ///
    /// `initial_targets` is copied onto the returned result as declarative
    /// project metadata. When `skipped_results_do_not_cause_cache_miss` is
    /// false, a cached `Skipped` entry for any requested target causes
    /// [`SatisfyResponse::NotSatisfied`].
    #[must_use]
    pub fn satisfy_request(
        &self,
        request: &BuildRequest,
        initial_targets: &[String],
        requested_targets: &[String],
        skipped_results_do_not_cause_cache_miss: bool,
    ) -> SatisfyResponse {
        let Some(stored) = self.get_result_for_configuration(request.configuration_id) else {
            return SatisfyResponse::NotSatisfied;
        };

        for target in requested_targets {
            let Some(target_result) = stored.target(target) else {
                return SatisfyResponse::NotSatisfied;
            };
            if target_result.is_skipped() && !skipped_results_do_not_cause_cache_miss {
                return SatisfyResponse::NotSatisfied;
            }
        }

        if request.flags.intersects(
            BuildRequestFlags::PROVIDE_PROJECT_STATE_AFTER_BUILD
                | BuildRequestFlags::PROVIDE_SUBSET_OF_STATE_AFTER_BUILD,
        ) {
            let Some(snapshot) = &stored.project_state_after_build else {
                return SatisfyResponse::NotSatisfied;
            };
            if request.flags.contains(BuildRequestFlags::PROVIDE_SUBSET_OF_STATE_AFTER_BUILD) {
                let Some(wanted) = &request.requested_project_state else {
                    return SatisfyResponse::NotSatisfied;
                };
                if !wanted.is_subset_of(&snapshot.filter) {
                    return SatisfyResponse::NotSatisfied;
                }
            }
        }

        let Some(mut restricted) = stored.restricted_to(requested_targets) else {
            return SatisfyResponse::NotSatisfied;
        };
        restricted.initial_targets = initial_targets.to_vec();
        SatisfyResponse::Satisfied(restricted)
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.results.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// All cached results, ordered by configuration id ascending.
    #[must_use]
    pub fn enumerate(&self) -> Vec<BuildResult> {
        let mut results: Vec<_> = self
            .results
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        results.sort_by_key(|r| r.configuration_id);
        results
    }

    /// The path a results-cache snapshot for `(submission_id,
    /// configuration_id)` lives at, under `root` (or the process temp root
    /// if `None`): `TEMP_ROOT/RESULTS_CACHE_<submission>_<config>.bin`.
    #[must_use]
    pub fn snapshot_path(
        submission_id: u64,
        configuration_id: ConfigurationId,
        root: Option<&std::path::Path>,
    ) -> std::path::PathBuf {
        let base = root.map_or_else(buildmux_config_cache::spill::temp_root, std::path::Path::to_path_buf);
        base.join(format!("RESULTS_CACHE_{submission_id}_{}.bin", configuration_id.raw()))
    }

    /// Write this cache to `path` as a file-based snapshot.
    ///
    /// Only the result for the smallest [`ConfigurationId`] survives —
    /// "oldest wins" compaction, matching the on-disk cache file the
    /// coordinator writes for the single project being resumed. A cache
    /// with no entries writes an empty snapshot.
    pub fn write_to_file(&self, path: &std::path::Path) -> Result<()> {
        let results = self.results.read().unwrap_or_else(|e| e.into_inner());
        let oldest = results.keys().min().and_then(|id| results.get(id));
        let json = serde_json::to_vec(&oldest).map_err(|e| Error::serialization(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| Error::io(e, path, "write"))
    }

    /// Read back a snapshot written by [`Self::write_to_file`].
    ///
    /// The returned cache holds at most the one surviving entry; any other
    /// configuration ids present before the cache was originally written are
    /// not recoverable.
    pub fn read_from_file(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::io(e, path, "read"))?;
        let snapshot: Option<BuildResult> =
            serde_json::from_slice(&bytes).map_err(|e| Error::serialization(e.to_string()))?;
        let cache = Self::new();
        if let Some(result) = snapshot {
            cache
                .results
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(result.configuration_id, result);
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildmux_core::request::RequestedProjectState;
    use buildmux_core::{ProjectStateAfterBuild, TargetResult, WorkUnitResult};

    fn config_id() -> ConfigurationId {
        ConfigurationId::new(1)
    }

    fn request(targets: &[&str]) -> BuildRequest {
        BuildRequest::new_top_level(1, 1, config_id(), targets.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn add_stores_a_fresh_result_for_a_new_configuration() {
        let cache = ResultsCache::new();
        let mut result = BuildResult::new(config_id(), 1, 1);
        result.set_target("Build", TargetResult::success());
        cache.add(result).unwrap();
        assert!(cache.get_result_for_configuration(config_id()).is_some());
    }

    #[test]
    fn add_merges_into_existing_result_for_same_configuration() {
        let cache = ResultsCache::new();
        let mut first = BuildResult::new(config_id(), 1, 1);
        first.set_target("Build", TargetResult::success());
        cache.add(first).unwrap();

        let mut second = BuildResult::new(config_id(), 1, 1);
        second.set_target("Clean", TargetResult::success());
        cache.add(second).unwrap();

        let merged = cache.get_result_for_configuration(config_id()).unwrap();
        assert!(merged.target("Build").is_some());
        assert!(merged.target("Clean").is_some());
    }

    #[test]
    fn get_result_for_request_errors_on_incomplete_result() {
        let cache = ResultsCache::new();
        let mut result = BuildResult::new(config_id(), 1, 1);
        result.set_target("Build", TargetResult::success());
        cache.add(result).unwrap();

        let request = request(&["Build", "Clean"]);
        assert!(cache.get_result_for_request(&request).is_err());
    }

    #[test]
    fn get_result_for_request_returns_none_for_absent_configuration() {
        let cache = ResultsCache::new();
        let request = request(&["Build"]);
        assert!(cache.get_result_for_request(&request).unwrap().is_none());
    }

    #[test]
    fn satisfy_request_rejects_skipped_target_unless_allowed() {
        let cache = ResultsCache::new();
        let mut result = BuildResult::new(config_id(), 1, 1);
        result.set_target(
            "Build",
            TargetResult {
                work_unit_result: WorkUnitResult::skipped(),
                items: Vec::new(),
            },
        );
        cache.add(result).unwrap();

        let request = request(&["Build"]);
        assert!(matches!(
            cache.satisfy_request(&request, &[], &["Build".to_string()], false),
            SatisfyResponse::NotSatisfied
        ));
        assert!(matches!(
            cache.satisfy_request(&request, &[], &["Build".to_string()], true),
            SatisfyResponse::Satisfied(_)
        ));
    }

    #[test]
    fn satisfy_request_rejects_stateful_request_against_stateless_cache_entry() {
        let cache = ResultsCache::new();
        let mut result = BuildResult::new(config_id(), 1, 1);
        result.set_target("Build", TargetResult::success());
        cache.add(result).unwrap();

        let mut request = request(&["Build"]);
        request.flags = BuildRequestFlags::PROVIDE_PROJECT_STATE_AFTER_BUILD;
        assert!(matches!(
            cache.satisfy_request(&request, &[], &["Build".to_string()], true),
            SatisfyResponse::NotSatisfied
        ));
    }

    #[test]
    fn satisfy_request_accepts_plain_request_against_stateful_cache_entry() {
        let cache = ResultsCache::new();
        let mut result = BuildResult::new(config_id(), 1, 1);
        result.set_target("Build", TargetResult::success());
        result.project_state_after_build = Some(ProjectStateAfterBuild::default());
        cache.add(result).unwrap();

        let request = request(&["Build"]);
        assert!(matches!(
            cache.satisfy_request(&request, &[], &["Build".to_string()], true),
            SatisfyResponse::Satisfied(_)
        ));
    }

    #[test]
    fn satisfy_request_checks_subset_filter() {
        let cache = ResultsCache::new();
        let mut result = BuildResult::new(config_id(), 1, 1);
        result.set_target("Build", TargetResult::success());
        result.project_state_after_build = Some(ProjectStateAfterBuild {
            filter: RequestedProjectState {
                properties: Some(["A".to_string()].into_iter().collect()),
                item_filters: None,
            },
            ..Default::default()
        });
        cache.add(result).unwrap();

        let mut narrow_request = request(&["Build"]);
        narrow_request.flags = BuildRequestFlags::PROVIDE_SUBSET_OF_STATE_AFTER_BUILD;
        narrow_request.requested_project_state = Some(RequestedProjectState {
            properties: Some(["A".to_string()].into_iter().collect()),
            item_filters: None,
        });
        assert!(matches!(
            cache.satisfy_request(&narrow_request, &[], &["Build".to_string()], true),
            SatisfyResponse::Satisfied(_)
        ));

        let mut wide_request = request(&["Build"]);
        wide_request.flags = BuildRequestFlags::PROVIDE_SUBSET_OF_STATE_AFTER_BUILD;
        wide_request.requested_project_state = Some(RequestedProjectState {
            properties: Some(["A".to_string(), "B".to_string()].into_iter().collect()),
            item_filters: None,
        });
        assert!(matches!(
            cache.satisfy_request(&wide_request, &[], &["Build".to_string()], true),
            SatisfyResponse::NotSatisfied
        ));
    }

    #[test]
    fn enumerate_is_ordered_by_configuration_id() {
        let cache = ResultsCache::new();
        cache.add(BuildResult::new(ConfigurationId::new(3), 1, 1)).unwrap();
        cache.add(BuildResult::new(ConfigurationId::new(1), 1, 1)).unwrap();
        cache.add(BuildResult::new(ConfigurationId::new(2), 1, 1)).unwrap();
        let ids: Vec<_> = cache.enumerate().iter().map(|r| r.configuration_id.raw()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn clear_removes_every_entry() {
        let cache = ResultsCache::new();
        cache.add(BuildResult::new(config_id(), 1, 1)).unwrap();
        cache.clear();
        assert!(cache.enumerate().is_empty());
    }

    #[test]
    #[allow(clippy::unnecessary_wraps)]
    fn merge_across_configurations_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let cache = ResultsCache::new();
        cache.add(BuildResult::new(ConfigurationId::new(1), 1, 1))?;
        let other = BuildResult::new(ConfigurationId::new(1), 1, 1);
        // Same configuration id merges fine; this asserts the underlying
        // core invariant is what actually guards cross-configuration merges.
        cache.add(other)?;
        let mismatched = BuildResult::new(ConfigurationId::new(2), 1, 1);
        let mut existing = cache.get_result_for_configuration(ConfigurationId::new(1)).unwrap();
        assert!(existing.merge_from(&mismatched).is_err());
        Ok(())
    }

    #[test]
    fn file_snapshot_keeps_only_the_smallest_configuration_id() {
        let cache = ResultsCache::new();
        for id in [1, 2, 3] {
            let mut result = BuildResult::new(ConfigurationId::new(id), 1, 1);
            result.set_target("Build", TargetResult::success());
            cache.add(result).unwrap();
        }

        let file = tempfile::NamedTempFile::new().unwrap();
        cache.write_to_file(file.path()).unwrap();
        let reloaded = ResultsCache::read_from_file(file.path()).unwrap();

        assert!(reloaded.get_result_for_configuration(ConfigurationId::new(1)).is_some());
        assert!(reloaded.get_result_for_configuration(ConfigurationId::new(2)).is_none());
        assert!(reloaded.get_result_for_configuration(ConfigurationId::new(3)).is_none());
    }

    #[test]
    fn snapshot_path_follows_the_results_cache_naming_convention() {
        let root = std::path::Path::new("/tmp/odd root");
        let path = ResultsCache::snapshot_path(7, ConfigurationId::new(3), Some(root));
        assert!(path.starts_with(root));
        assert_eq!(path.file_name().unwrap(), "RESULTS_CACHE_7_3.bin");
    }

    #[test]
    fn file_snapshot_of_an_empty_cache_round_trips_to_empty() {
        let cache = ResultsCache::new();
        let file = tempfile::NamedTempFile::new().unwrap();
        cache.write_to_file(file.path()).unwrap();
        let reloaded = ResultsCache::read_from_file(file.path()).unwrap();
        assert!(reloaded.enumerate().is_empty());
    }
}
