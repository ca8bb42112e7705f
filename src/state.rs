//! The persisted build-state store.
//!
//! Bundled with the [`ArtifactRegistry`] into one [`PersistedState`] struct
//! under one mutex, saved with one atomic write-then-rename, so "commit
//! point" is a single rename of a single file — the straightforward way to
//! give two maps that must always agree the same atomicity guarantee a
//! single file already has.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::ArtifactRegistry;
use crate::toolchain::ToolchainInfo;
use crate::util::{read_json_file_lenient, write_json_file_atomic};

/// Bumped whenever the persisted shape changes in a way that makes old files
/// unsafe to reuse (e.g. a digest width change, per the FNV-1a/SHA-256 open
/// question). Unrecognized formats are treated as empty, never fatal.
pub const STATE_FORMAT: &str = "ariamake-state-v1";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateRecord {
    pub output_path: PathBuf,
    pub command_digest: u64,
    pub link_digest: Option<u64>,
    pub last_built_at: i64,
    pub toolchain_version: String,
    /// Source path -> mtime tick observed at last successful build.
    pub source_stamps: BTreeMap<PathBuf, i64>,
    /// Additional files the compiler reported as dependencies, with stamps.
    pub implicit_deps: BTreeMap<PathBuf, i64>,
    /// Artifact paths this target was linked against.
    pub dependency_outputs: Vec<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(rename = "_format")]
    format: String,
    records: BTreeMap<String, StateRecord>,
    registry: ArtifactRegistry,
}

/// Owns the state records and artifact registry for one build root, behind a
/// single mutex. Bound to an explicit [`crate::build::Build`] object rather
/// than a process-wide singleton, per the "no static mutable globals" design
/// note.
pub struct PersistedState {
    inner: Mutex<StateDocument>,
}

impl PersistedState {
    pub fn empty() -> Self {
        Self {
            inner: Mutex::new(StateDocument {
                format: STATE_FORMAT.to_string(),
                records: BTreeMap::new(),
                registry: ArtifactRegistry::default(),
            }),
        }
    }

    /// Never errors: malformed or absent content logs a warning and yields
    /// an empty store, per the state store's load contract.
    pub fn load(path: &Path) -> Self {
        match read_json_file_lenient::<StateDocument>(path) {
            Some(doc) if doc.format == STATE_FORMAT => Self { inner: Mutex::new(doc) },
            Some(doc) => {
                tracing::warn!(
                    found = %doc.format,
                    expected = STATE_FORMAT,
                    "state file format mismatch, starting with empty state"
                );
                Self::empty()
            }
            None => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), "state file unreadable, starting with empty state");
                }
                Self::empty()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let doc = self.inner.lock().unwrap();
        write_json_file_atomic(&*doc, path)
    }

    pub fn record(&self, target: &str) -> Option<StateRecord> {
        self.inner.lock().unwrap().records.get(target).cloned()
    }

    /// Updates the state record and artifact registry for a just-finished
    /// target atomically with respect to other finishing workers.
    pub fn record_success(
        &self,
        target: &str,
        record: StateRecord,
        entries: Vec<crate::registry::ArtifactEntry>,
    ) {
        let mut doc = self.inner.lock().unwrap();
        doc.records.insert(target.to_string(), record);
        doc.registry.set_entries(target, entries);
    }

    pub fn remove(&self, target: &str) {
        let mut doc = self.inner.lock().unwrap();
        doc.records.remove(target);
        doc.registry.remove(target);
    }

    pub fn with_registry<R>(&self, f: impl FnOnce(&ArtifactRegistry) -> R) -> R {
        let doc = self.inner.lock().unwrap();
        f(&doc.registry)
    }

    pub fn toolchain_matches(&self, target: &str, toolchain: &ToolchainInfo) -> bool {
        self.record(target).map(|r| r.toolchain_version == toolchain.version_string)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ArtifactEntry, ArtifactKind};
    use tempfile::tempdir;

    fn record() -> StateRecord {
        StateRecord {
            output_path: "build/app".into(),
            command_digest: 42,
            link_digest: Some(7),
            last_built_at: 1000,
            toolchain_version: "aria-cc 1.0".into(),
            source_stamps: BTreeMap::new(),
            implicit_deps: BTreeMap::new(),
            dependency_outputs: vec![],
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let state = PersistedState::load(&dir.path().join("state.json"));
        assert!(state.record("app").is_none());
    }

    #[test]
    fn malformed_file_loads_empty_and_does_not_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();
        let state = PersistedState::load(&path);
        assert!(state.record("app").is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = PersistedState::empty();
        state.record_success(
            "app",
            record(),
            vec![ArtifactEntry { path: "build/app".into(), kind: ArtifactKind::File }],
        );
        state.save(&path).unwrap();

        let reloaded = PersistedState::load(&path);
        let rec = reloaded.record("app").unwrap();
        assert_eq!(rec.command_digest, 42);
        assert_eq!(reloaded.with_registry(|r| r.entries("app").len()), 1);
    }

    #[test]
    fn save_is_atomic_no_partial_file_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = PersistedState::empty();
        state.record_success("app", record(), vec![]);
        state.save(&path).unwrap();
        assert!(!dir.path().join(".state.json.tmp").exists());
    }
}
