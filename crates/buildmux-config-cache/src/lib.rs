//! Interns [`BuildRequestConfiguration`] objects by their identity tuple and
//! manages spilling their evaluated project state to disk.

pub mod error;
pub mod spill;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::RwLock;

use buildmux_core::config::ConfigurationKey;
use buildmux_core::{BuildRequestConfiguration, ConfigurationId};

pub use error::{Error, Result};

/// Process-wide cache interning configurations by `(project_full_path,
/// global_properties, tools_version)` under name-insensitive comparison.
#[derive(Default)]
pub struct ConfigCache {
    entries: RwLock<HashMap<ConfigurationId, BuildRequestConfiguration>>,
    by_identity: RwLock<HashMap<ConfigurationKey, ConfigurationId>>,
    remote_to_local: RwLock<HashMap<ConfigurationId, ConfigurationId>>,
    next_id: AtomicI32,
}

impl ConfigCache {
    /// An empty cache, with id allocation starting at `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            by_identity: RwLock::new(HashMap::new()),
            remote_to_local: RwLock::new(HashMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    fn allocate_id(&self) -> ConfigurationId {
        ConfigurationId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Intern `config`, returning its stable id: the existing id if an
    /// equal configuration was already interned, otherwise a freshly
    /// allocated positive one.
    pub fn intern(&self, config: BuildRequestConfiguration) -> ConfigurationId {
        let identity = config.identity();
        if let Some(existing) = self.by_identity.read().unwrap_or_else(|e| e.into_inner()).get(&identity) {
            return *existing;
        }

        let mut by_identity = self.by_identity.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = by_identity.get(&identity) {
            return *existing;
        }
        let id = self.allocate_id();
        let mut config = config;
        config.id = id;
        by_identity.insert(identity, id);
        self.entries.write().unwrap_or_else(|e| e.into_inner()).insert(id, config);
        id
    }

    /// Reconcile a remote node's negatively-id'd configuration with the
    /// local cache: interns `config` under its identity and records a
    /// mapping from `remote_id` to the canonical local id, so subsequent
    /// translations of the same remote id resolve to the same local one.
    pub fn reconcile_remote(
        &self,
        remote_id: ConfigurationId,
        config: BuildRequestConfiguration,
    ) -> ConfigurationId {
        if let Some(mapped) = self
            .remote_to_local
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&remote_id)
        {
            return *mapped;
        }
        let local_id = self.intern(config);
        self.remote_to_local
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(remote_id, local_id);
        local_id
    }

    /// Fetch a clone of the configuration registered under `id`.
    #[must_use]
    pub fn get(&self, id: ConfigurationId) -> Option<BuildRequestConfiguration> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn has(&self, id: ConfigurationId) -> bool {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).contains_key(&id)
    }

    /// Register a shallow copy of the configuration at `id` under `new_id`.
    ///
    /// Fails with [`Error::NotFound`] if `id` is not registered, or
    /// propagates the `InternalError` from
    /// [`BuildRequestConfiguration::clone_with_new_id`] if `new_id` is the
    /// unassigned sentinel.
    pub fn clone_with_new_id(&self, id: ConfigurationId, new_id: ConfigurationId) -> Result<ConfigurationId> {
        let source = self.get(id).ok_or_else(|| Error::not_found(id.raw()))?;
        let cloned = source
            .clone_with_new_id(new_id)
            .map_err(|e| Error::internal(e.to_string()))?;
        self.entries.write().unwrap_or_else(|e| e.into_inner()).insert(new_id, cloned);
        Ok(new_id)
    }

    /// All registered configurations, ordered by id ascending.
    #[must_use]
    pub fn enumerate(&self) -> Vec<BuildRequestConfiguration> {
        let mut configs: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        configs.sort_by_key(|c| c.id);
        configs
    }

    /// Spill a configuration's attached project instance to disk, clearing
    /// the in-memory copy. No-op if the configuration is not cacheable or
    /// has no attached instance.
    pub fn spill(&self, id: ConfigurationId, root: Option<&std::path::Path>) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let Some(config) = entries.get_mut(&id) else {
            return Err(Error::not_found(id.raw()));
        };
        if !config.is_cacheable {
            return Ok(());
        }
        let Some(instance) = config.project_instance.take() else {
            return Ok(());
        };
        spill::spill(id, &instance, root)?;
        Ok(())
    }

    /// Restore a previously spilled project instance into the in-memory
    /// configuration.
    pub fn retrieve_from_cache(&self, id: ConfigurationId, root: Option<&std::path::Path>) -> Result<()> {
        let instance = spill::retrieve_from_cache(id, root)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let Some(config) = entries.get_mut(&id) else {
            return Err(Error::not_found(id.raw()));
        };
        config.project_instance = Some(instance);
        Ok(())
    }
}
