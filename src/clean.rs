//! Clean lifecycle: full clean, single-target clean, and orphan clean, each
//! with a dry-run mode that reports without touching the filesystem.

use std::path::PathBuf;

use crate::manifest::Manifest;
use crate::registry::ArtifactEntry;
use crate::report::Reporter;
use crate::state::PersistedState;

#[derive(Debug, Default)]
pub struct CleanReport {
    /// Paths removed (or, under `dry_run`, paths that would be removed).
    pub removed: Vec<PathBuf>,
    /// Paths a removal was attempted for but that still exist afterward.
    pub residue: Vec<PathBuf>,
}

/// Removes every artifact for every target currently in the registry.
pub fn full_clean(state: &PersistedState, state_path: &std::path::Path, dry_run: bool, reporter: &dyn Reporter) -> crate::error::Result<CleanReport> {
    let targets: Vec<String> = state.with_registry(|r| r.all().map(|(name, _)| name.to_string()).collect::<std::collections::HashSet<_>>().into_iter().collect());
    let mut report = CleanReport::default();
    for target in &targets {
        let partial = clean_target(state, target, dry_run, reporter);
        report.removed.extend(partial.removed);
        report.residue.extend(partial.residue);
    }
    if !dry_run {
        state.save(state_path)?;
    }
    Ok(report)
}

/// Removes every artifact recorded for a single target, then removes its
/// state record and registry entry.
pub fn clean_target(state: &PersistedState, target: &str, dry_run: bool, reporter: &dyn Reporter) -> CleanReport {
    let entries: Vec<ArtifactEntry> = state.with_registry(|r| r.entries(target).to_vec());
    let mut report = CleanReport::default();

    for entry in &entries {
        report.removed.push(entry.path.clone());
        if dry_run {
            reporter.on_diagnostic("clean_dry_run", Some(target), &format!("would remove `{}`", entry.path.display()));
            continue;
        }
        remove_entry(entry);
        if entry.path.exists() {
            report.residue.push(entry.path.clone());
            reporter.on_diagnostic("clean_residue", Some(target), &format!("`{}` still exists after removal", entry.path.display()));
        }
    }

    if !dry_run {
        state.remove(target);
    }

    report
}

/// Removes every target present in the registry but absent from `manifest`.
pub fn clean_orphans(state: &PersistedState, state_path: &std::path::Path, manifest: &Manifest, dry_run: bool, reporter: &dyn Reporter) -> crate::error::Result<CleanReport> {
    let orphans = state.with_registry(|r| r.orphans(manifest));
    let mut report = CleanReport::default();
    for target in &orphans {
        let partial = clean_target(state, target, dry_run, reporter);
        report.removed.extend(partial.removed);
        report.residue.extend(partial.residue);
    }
    if !dry_run {
        state.save(state_path)?;
    }
    Ok(report)
}

fn remove_entry(entry: &ArtifactEntry) {
    use crate::registry::ArtifactKind;
    let result = match entry.kind {
        ArtifactKind::File => std::fs::remove_file(&entry.path),
        ArtifactKind::Directory => std::fs::remove_dir_all(&entry.path),
    };
    // Best-effort: a removal failure (already gone, permission denied) is
    // reported as residue by the caller's existence re-check, not here.
    let _ = result;
}
