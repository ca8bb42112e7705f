//! Path, timestamp and atomic-file helpers shared by the state store, artifact
//! registry and compilation-database emitter.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AriaError, Result};

/// Canonicalizes `path` to an absolute, forward-slash form, matching the
/// manifest contract's "canonical, forward-slash form" requirement for
/// `sources` entries. Falls back to a lexical join against the current
/// directory when the path does not exist yet (e.g. a synthesized output
/// path whose parent hasn't been created).
pub fn canonical_forward_slash(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let absolute = dunce::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    });
    PathBuf::from(path_slash::PathExt::to_slash_lossy(absolute.as_path()).into_owned())
}

/// Reads the modification time of `path` as a raw tick count (integer seconds
/// since the Unix epoch), matching the "normalize to a single integer tick
/// representation on read" requirement. Returns `None` if the file is
/// missing or its mtime cannot be determined.
pub fn mtime_ticks(path: impl AsRef<Path>) -> Option<i64> {
    let meta = fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?;
    Some(system_time_to_ticks(modified))
}

pub fn system_time_to_ticks(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Creates the parent directory of `file` and all its ancestors if missing.
pub fn create_parent_dir_all(file: &Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AriaError::io(file.display().to_string(), e))?;
    }
    Ok(())
}

/// Reads and deserializes a JSON file, returning `None` (not an error) if the
/// file does not exist or fails to parse — callers treat both as "empty" per
/// the load contracts of the state store and artifact registry.
pub fn read_json_file_lenient<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Serializes `value` to a sibling temp file and renames it over `path`. The
/// rename is the commit point: readers never observe a partially written
/// file, satisfying the atomic-state testable property.
pub fn write_json_file_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    create_parent_dir_all(path)?;
    let tmp_path = sibling_tmp_path(path);
    {
        let file = fs::File::create(&tmp_path)
            .map_err(|e| AriaError::io(path.display().to_string(), e))?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(|e| AriaError::io(path.display().to_string(), e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| AriaError::io(path.display().to_string(), e))?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("state");
    path.with_file_name(format!(".{file_name}.tmp"))
}
