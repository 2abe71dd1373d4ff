//! Build request configurations and their identity.

use crate::error::{Error, Result};
use crate::names::{CiString, GlobalProperties};

/// Identifies a [`BuildRequestConfiguration`] once it has been interned.
///
/// `0` is the unassigned sentinel a fresh configuration carries before it is
/// handed to a cache; negative values mark configurations allocated by a
/// remote node (the local cache never assigns these, it only mirrors them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConfigurationId(i32);

impl ConfigurationId {
    /// The sentinel carried by a configuration that has not been interned.
    pub const UNASSIGNED: Self = Self(0);

    /// Wrap a raw id. Positive ids are locally assigned, negative ids are
    /// remotely assigned, `0` means unassigned.
    #[must_use]
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw wire/cache representation.
    #[must_use]
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Whether this id has not yet been assigned by a cache.
    #[must_use]
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// Whether this id was assigned by the local node.
    #[must_use]
    pub fn is_local(self) -> bool {
        self.0 > 0
    }

    /// Whether this id was assigned by a remote node.
    #[must_use]
    pub fn is_remote(self) -> bool {
        self.0 < 0
    }
}

impl Default for ConfigurationId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl std::fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A minimal evaluated-project placeholder.
///
/// Full project evaluation is an external collaborator boundary; this crate
/// only needs a container shape that the request engine can snapshot and
/// hand back as part of [`crate::result::ProjectStateAfterBuild`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectInstance {
    /// Evaluated properties, keyed case-insensitively.
    pub properties: std::collections::BTreeMap<String, String>,
    /// Evaluated items, keyed by item type name, case-insensitively.
    pub items: std::collections::BTreeMap<String, Vec<String>>,
}

/// The tuple identifying a configuration: path, global properties, and
/// tools version, all compared case-insensitively on the text parts.
///
/// Two configurations with the same identity are the same configuration for
/// caching purposes regardless of any other field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigurationKey {
    project_full_path: CiString,
    global_properties: GlobalPropertiesKey,
    tools_version: CiString,
}

#[derive(Debug, Clone)]
struct GlobalPropertiesKey(GlobalProperties);

impl PartialEq for GlobalPropertiesKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for GlobalPropertiesKey {}
impl std::hash::Hash for GlobalPropertiesKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// A build request configuration: a project evaluated with a fixed set of
/// global properties and tools version.
///
/// Identity (and therefore `PartialEq`/`Hash` via [`Self::identity`]) covers
/// only `project_full_path`, `global_properties`, and `tools_version`; the
/// remaining fields are mutable bookkeeping that does not affect whether two
/// configurations are "the same" for cache purposes.
#[derive(Debug, Clone)]
pub struct BuildRequestConfiguration {
    /// Id assigned once this configuration is interned by a cache.
    pub id: ConfigurationId,
    /// Absolute path to the project file.
    pub project_full_path: String,
    /// Global properties this configuration was evaluated with.
    pub global_properties: GlobalProperties,
    /// The tools version requested for evaluation.
    pub tools_version: String,
    /// The evaluated project, once evaluation has run.
    pub project_instance: Option<ProjectInstance>,
    /// Whether results for this configuration may be cached at all.
    pub is_cacheable: bool,
    /// Whether this configuration has completed evaluation.
    pub is_loaded: bool,
    /// Whether a build is currently in progress for this configuration.
    pub is_actively_building: bool,
    /// Whether this configuration was created in response to a remote node.
    pub was_generated_by_node: bool,
}

impl BuildRequestConfiguration {
    /// Construct a fresh, uninterned configuration.
    #[must_use]
    pub fn new(
        project_full_path: impl Into<String>,
        global_properties: GlobalProperties,
        tools_version: impl Into<String>,
    ) -> Self {
        Self {
            id: ConfigurationId::UNASSIGNED,
            project_full_path: project_full_path.into(),
            global_properties,
            tools_version: tools_version.into(),
            project_instance: None,
            is_cacheable: true,
            is_loaded: false,
            is_actively_building: false,
            was_generated_by_node: false,
        }
    }

    /// The identity tuple used for cache lookups and equality.
    #[must_use]
    pub fn identity(&self) -> ConfigurationKey {
        ConfigurationKey {
            project_full_path: CiString::new(self.project_full_path.clone()),
            global_properties: GlobalPropertiesKey(self.global_properties.clone()),
            tools_version: CiString::new(self.tools_version.clone()),
        }
    }

    /// Clone this configuration's identity-bearing fields under a new id.
    ///
    /// Mirrors out-of-process cache mirroring: a remote node's configuration
    /// is re-interned locally with a freshly allocated id while keeping the
    /// same project/properties/tools-version identity. `is_loaded`,
    /// `is_actively_building`, and `project_instance` reset, since those
    /// describe progress local to one cache entry.
    pub fn clone_with_new_id(&self, new_id: ConfigurationId) -> Result<Self> {
        if new_id.is_unassigned() {
            return Err(Error::internal(
                "clone_with_new_id requires an assigned configuration id",
            ));
        }
        Ok(Self {
            id: new_id,
            project_full_path: self.project_full_path.clone(),
            global_properties: self.global_properties.clone(),
            tools_version: self.tools_version.clone(),
            project_instance: None,
            is_cacheable: self.is_cacheable,
            is_loaded: false,
            is_actively_building: false,
            was_generated_by_node: true,
        })
    }
}

impl PartialEq for BuildRequestConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for BuildRequestConfiguration {}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> GlobalProperties {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn identity_ignores_case_in_path_and_tools_version() {
        let a = BuildRequestConfiguration::new("/Repo/App.proj", props(&[]), "Current");
        let b = BuildRequestConfiguration::new("/repo/app.proj", props(&[]), "current");
        assert_eq!(a, b);
    }

    #[test]
    fn identity_is_sensitive_to_global_properties() {
        let a = BuildRequestConfiguration::new("/app.proj", props(&[("Configuration", "Debug")]), "current");
        let b = BuildRequestConfiguration::new("/app.proj", props(&[("Configuration", "Release")]), "current");
        assert_ne!(a, b);
    }

    #[test]
    fn clone_with_new_id_rejects_unassigned_target() {
        let a = BuildRequestConfiguration::new("/app.proj", props(&[]), "current");
        assert!(a.clone_with_new_id(ConfigurationId::UNASSIGNED).is_err());
    }

    #[test]
    fn clone_with_new_id_preserves_identity_resets_progress() {
        let mut a = BuildRequestConfiguration::new("/app.proj", props(&[]), "current");
        a.is_loaded = true;
        a.is_actively_building = true;
        let cloned = a.clone_with_new_id(ConfigurationId::new(7)).unwrap();
        assert_eq!(cloned.id, ConfigurationId::new(7));
        assert_eq!(cloned, a);
        assert!(!cloned.is_loaded);
        assert!(!cloned.is_actively_building);
        assert!(cloned.was_generated_by_node);
    }
}
