//! File-backed configuration for the `buildmux` binary, layered under the
//! environment variables spec §6 names.
//!
//! Environment variables always win over a loaded `buildmux.toml`, matching
//! the teacher's `cache_root`/`tasks` override pattern: each getter checks
//! the environment first and only falls back to the parsed file value.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Parsed `buildmux.toml`, every field optional so a partial or absent file
/// is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildmuxConfig {
    /// Override for the temp root configurations and results spill under.
    pub temp_root: Option<PathBuf>,
    /// Default `max_cpu_count` for the central node.
    pub max_cpu_count: Option<usize>,
    /// Force all work to worker processes (`DISABLE_IN_PROC_NODE`).
    #[serde(default)]
    pub disable_in_proc_node: bool,
    /// Force multi-threaded execution for CLI-invoked tasks (`MULTITHREADED`).
    #[serde(default)]
    pub multithreaded: bool,
}

impl BuildmuxConfig {
    /// Load from an explicit path, or discover `buildmux.toml` in `cwd`;
    /// a missing file is not an error, it yields [`Self::default`].
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, LoadError> {
        let candidate = explicit.map(Path::to_path_buf).unwrap_or_else(|| cwd.join("buildmux.toml"));
        match std::fs::read_to_string(&candidate) {
            Ok(text) => toml::from_str(&text).map_err(|source| LoadError::Parse {
                path: candidate,
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => Ok(Self::default()),
            Err(source) => Err(LoadError::Read { path: candidate, source }),
        }
    }

    /// The effective temp root: `DEBUG_PATH`'s sibling concern, but this one
    /// is specifically the results-cache/config-cache spill root, resolved
    /// from environment, then file, then the process temp directory.
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        std::env::var_os("BUILDMUX_TEMP_ROOT")
            .map(PathBuf::from)
            .or_else(|| self.temp_root.clone())
            .unwrap_or_else(std::env::temp_dir)
    }

    /// The effective `max_cpu_count`, defaulting to the number of available
    /// parallelism hints (or `1` if that cannot be determined).
    #[must_use]
    pub fn max_cpu_count(&self) -> usize {
        std::env::var("BUILDMUX_MAX_CPU_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(self.max_cpu_count)
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get))
    }

    /// Whether `DISABLE_IN_PROC_NODE` or the file setting forces all work
    /// to worker processes.
    #[must_use]
    pub fn disable_in_proc_node(&self) -> bool {
        env_truthy("DISABLE_IN_PROC_NODE") || self.disable_in_proc_node
    }

    /// Whether `MULTITHREADED` or the file setting forces multi-threaded
    /// execution for CLI-invoked tasks.
    #[must_use]
    pub fn multithreaded(&self) -> bool {
        env_truthy("MULTITHREADED") || self.multithreaded
    }
}

fn env_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false)
}

/// Failure loading `buildmux.toml`.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read (and was explicitly requested).
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The path that failed to read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file was read but did not parse as TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The path that failed to parse.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_default_when_not_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildmuxConfig::load(None, dir.path()).unwrap();
        assert!(config.temp_root.is_none());
        assert_eq!(config.max_cpu_count, None);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(BuildmuxConfig::load(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn parses_fields_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildmux.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "max_cpu_count = 4\ndisable_in_proc_node = true").unwrap();
        let config = BuildmuxConfig::load(Some(&path), dir.path()).unwrap();
        assert_eq!(config.max_cpu_count, Some(4));
        assert!(config.disable_in_proc_node());
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildmux.toml");
        std::fs::write(&path, "max_cpu_count = 4").unwrap();
        let config = BuildmuxConfig::load(Some(&path), dir.path()).unwrap();
        temp_env::with_var("BUILDMUX_MAX_CPU_COUNT", Some("9"), || {
            assert_eq!(config.max_cpu_count(), 9);
        });
    }
}
