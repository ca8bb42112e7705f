//! Shared scaffolding for the end-to-end scenario tests: a `TestProject`
//! builder wired to the fake `aria-cc`/`aria-ar` scripts under
//! `tests/fixtures/`, so every scenario builds real files through the real
//! `Build` pipeline without depending on an actual Aria toolchain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ariamake::config::{BuildConfig, Platform, ToolchainPaths};
use ariamake::manifest::{Manifest, ProjectInfo, TargetDef, TargetKind, TestMode};
use ariamake::report::{NullReporter, Reporter};
use ariamake::{AriaError, Build, Result, ScheduleOutcome};

pub struct TestProject {
    dir: tempfile::TempDir,
    targets: Vec<TargetDef>,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        Self { dir, targets: Vec::new() }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_source(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source dir");
        }
        std::fs::write(&path, contents).expect("write source");
        path
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn add_target(&mut self, target: TargetDef) -> &mut Self {
        self.targets.push(target);
        self
    }

    pub fn target_mut(&mut self, name: &str) -> &mut TargetDef {
        self.targets.iter_mut().find(|t| t.name == name).expect("target exists")
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            project: ProjectInfo { name: "fixture".into(), version: "0.0.0".into(), test_mode: TestMode::Jit },
            targets: self.targets.clone(),
        }
    }

    pub fn config(&self) -> BuildConfig {
        BuildConfig {
            project_root: self.dir.path().to_path_buf(),
            state_dir: self.dir.path().join(".ariamake"),
            jobs: 4,
            fail_fast: false,
            verbose: false,
            force_rebuild: false,
            platform: Platform::Elf,
            toolchain: ToolchainPaths { compiler: fixture_path("aria-cc"), archiver: fixture_path("aria-ar") },
            module_search_path: None,
        }
    }

    /// Constructs a fresh `Build` over the current manifest + config.
    pub fn new_build(&self) -> Result<Arc<Build>> {
        Ok(Arc::new(Build::new(self.manifest(), self.config())?))
    }

    /// `plan(force=false)` then `run`, the shape every scenario exercises.
    pub fn build_once(&self) -> Result<ScheduleOutcome> {
        self.build_with_reporter(Arc::new(NullReporter))
    }

    pub fn build_with_reporter(&self, reporter: Arc<dyn Reporter>) -> Result<ScheduleOutcome> {
        let build = self.new_build()?;
        let plan = build.plan(false, reporter.as_ref())?;
        build.run(&plan, reporter)
    }

    pub fn state_json(&self) -> serde_json::Value {
        let text = std::fs::read_to_string(self.config().state_file()).expect("state file exists");
        serde_json::from_str(&text).expect("state file is valid json")
    }
}

/// Convenience target constructor matching the manifest contract's defaults.
pub fn target(name: &str, kind: TargetKind, sources: &[&str], deps: &[&str], output: &str) -> TargetDef {
    TargetDef {
        name: name.to_string(),
        kind,
        sources: sources.iter().map(PathBuf::from).collect(),
        direct_deps: deps.iter().map(|s| s.to_string()).collect(),
        compile_flags: vec![],
        link_flags: vec![],
        libraries: vec![],
        library_search_paths: vec![],
        output: PathBuf::from(output),
        extra_artifacts: vec![],
        working_dir: None,
    }
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Maps an `AriaError` to the exit code `ariamake`'s CLI front-end would
/// report for it, per the core's documented exit-code contract. Kept here
/// rather than imported from the binary crate: integration tests only see
/// the library's public surface.
pub fn exit_code_for(err: &AriaError) -> i32 {
    match err {
        AriaError::Manifest { .. } | AriaError::StateCorruption { .. } => 2,
        AriaError::Cycle { .. } => 3,
        AriaError::ToolchainMissing { .. } => 4,
        AriaError::SubprocessFailure { .. }
        | AriaError::Timeout { .. }
        | AriaError::DirtyAnalysis { .. }
        | AriaError::Io { .. }
        | AriaError::Serde(_)
        | AriaError::Cancelled => 1,
    }
}
