//! The `DEBUG_PATH`/`DEBUG_ENGINE` internal-error dump mechanism.

use std::io;
use std::path::{Path, PathBuf};

const DUMP_SUBDIRECTORY: &str = ".BUILD_LOGS";

/// Whether the dump mechanism is enabled via `DEBUG_ENGINE`.
#[must_use]
pub fn debug_enabled() -> bool {
    std::env::var("DEBUG_ENGINE")
        .map(|v| {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        })
        .unwrap_or(false)
}

/// Resolve the directory dump files are written into.
///
/// `DEBUG_PATH` is resolved relative to `cwd` when it is a relative path; if
/// unset, dumps go under the process temp directory. Either way a fixed
/// `.BUILD_LOGS` subdirectory is appended.
#[must_use]
pub fn dump_directory(cwd: &Path) -> PathBuf {
    let base = match std::env::var("DEBUG_PATH") {
        Ok(raw) if !raw.is_empty() => {
            let candidate = PathBuf::from(raw);
            if candidate.is_absolute() {
                candidate
            } else {
                cwd.join(candidate)
            }
        }
        _ => std::env::temp_dir(),
    };
    base.join(DUMP_SUBDIRECTORY)
}

/// The dump file name for a given timestamp, formatted
/// `BUILD_<timestamp>_failure.txt`.
#[must_use]
pub fn dump_file_name(timestamp: &str) -> String {
    format!("BUILD_{timestamp}_failure.txt")
}

/// Write a dump file if the debug mechanism is enabled.
///
/// Returns `Ok(None)` (no I/O performed) when `DEBUG_ENGINE` is not set.
pub fn write_dump_if_enabled(
    cwd: &Path,
    timestamp: &str,
    contents: &str,
) -> io::Result<Option<PathBuf>> {
    if !debug_enabled() {
        return Ok(None);
    }
    let dir = dump_directory(cwd);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(dump_file_name(timestamp));
    std::fs::write(&path, contents)?;
    Ok(Some(path))
}
