//! Spilling a configuration's evaluated [`ProjectInstance`] to a temp file
//! and retrieving it back, so the in-memory cache need not hold every
//! evaluated project at once.
//!
//! [`ProjectInstance`]: buildmux_core::ProjectInstance

use std::path::PathBuf;

use buildmux_core::{ConfigurationId, ProjectInstance};

use crate::error::{Error, Result};

/// The process-wide root spill files are written under.
///
/// Resolved once from `BUILDMUX_TEMP_ROOT` if set, falling back to the
/// platform temp directory. The root's bytes are preserved verbatim — it is
/// joined as an opaque `PathBuf` component rather than parsed, so it is
/// tolerant of any bytes a caller configures up to a path separator.
#[must_use]
pub fn temp_root() -> PathBuf {
    std::env::var_os("BUILDMUX_TEMP_ROOT")
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(std::env::temp_dir)
}

/// The path a configuration's spilled project instance lives at, under
/// `root` (or the process temp root if `None`).
#[must_use]
pub fn spill_path(id: ConfigurationId, root: Option<&std::path::Path>) -> PathBuf {
    let base = root.map_or_else(temp_root, std::path::Path::to_path_buf);
    base.join(format!("CONFIGURATION_{}.bin", id.raw()))
}

/// Write `instance` to its spill file, creating the temp root if needed.
pub fn spill(
    id: ConfigurationId,
    instance: &ProjectInstance,
    root: Option<&std::path::Path>,
) -> Result<PathBuf> {
    let path = spill_path(id, root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
    }
    let bytes = serde_json::to_vec(instance)
        .map_err(|e| Error::serialization(format!("failed to encode project instance: {e}")))?;
    std::fs::write(&path, bytes).map_err(|e| Error::io(e, path.clone(), "write"))?;
    Ok(path)
}

/// Read a previously spilled project instance back.
pub fn retrieve_from_cache(
    id: ConfigurationId,
    root: Option<&std::path::Path>,
) -> Result<ProjectInstance> {
    let path = spill_path(id, root);
    let bytes = std::fs::read(&path).map_err(|e| Error::io(e, path.clone(), "read"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::serialization(format!("failed to decode project instance: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spill_path_begins_with_configured_root() {
        let root = std::path::Path::new("/tmp/weird root with spaces");
        let path = spill_path(ConfigurationId::new(5), Some(root));
        assert!(path.starts_with(root));
        assert_eq!(path.file_name().unwrap(), "CONFIGURATION_5.bin");
    }

    #[test]
    fn spill_then_retrieve_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut instance = ProjectInstance::default();
        instance.properties.insert("Configuration".to_string(), "Debug".to_string());
        spill(ConfigurationId::new(3), &instance, Some(tmp.path())).unwrap();
        let retrieved = retrieve_from_cache(ConfigurationId::new(3), Some(tmp.path())).unwrap();
        assert_eq!(retrieved, instance);
    }

    #[test]
    fn retrieve_without_prior_spill_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(retrieve_from_cache(ConfigurationId::new(99), Some(tmp.path())).is_err());
    }
}
