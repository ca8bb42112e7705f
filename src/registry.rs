//! Artifact registry: every file or directory a build has ever produced, per
//! target. The authoritative list clean operations act on.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    Directory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArtifactRegistry {
    targets: BTreeMap<String, Vec<ArtifactEntry>>,
}

impl ArtifactRegistry {
    pub fn entries(&self, target: &str) -> &[ArtifactEntry] {
        self.targets.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_entries(&mut self, target: &str, entries: Vec<ArtifactEntry>) {
        self.targets.insert(target.to_string(), entries);
    }

    pub fn remove(&mut self, target: &str) -> Option<Vec<ArtifactEntry>> {
        self.targets.remove(target)
    }

    pub fn all(&self) -> impl Iterator<Item = (&str, &ArtifactEntry)> {
        self.targets.iter().flat_map(|(name, entries)| entries.iter().map(move |e| (name.as_str(), e)))
    }

    /// Target names present in the registry but absent from `manifest` —
    /// candidate orphans for `clean --stale`.
    pub fn orphans(&self, manifest: &Manifest) -> Vec<String> {
        let live: std::collections::HashSet<&str> =
            manifest.targets.iter().map(|t| t.name.as_str()).collect();
        self.targets.keys().filter(|name| !live.contains(name.as_str())).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphans_reports_targets_not_in_manifest() {
        use crate::manifest::{ProjectInfo, TestMode};
        let mut reg = ArtifactRegistry::default();
        reg.set_entries(
            "stale",
            vec![ArtifactEntry { path: "build/stale".into(), kind: ArtifactKind::File }],
        );
        let manifest = Manifest {
            project: ProjectInfo { name: "p".into(), version: "0".into(), test_mode: TestMode::Jit },
            targets: vec![],
        };
        assert_eq!(reg.orphans(&manifest), vec!["stale".to_string()]);
    }
}
