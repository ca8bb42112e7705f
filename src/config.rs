//! Engine-level configuration: how to run the engine, as opposed to the
//! manifest's *what to build*. Mirrors the teacher's split between a
//! `Project`/`ProjectPathsConfig` (what) and per-call knobs like `num_jobs`
//! (how).

use std::path::PathBuf;

/// Link/archive flag-pair convention. The invoked toolchain determines this;
/// the core never guesses, it is told.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    /// `-L<dir>` / `-l<name>`.
    Elf,
    /// `<name>.lib` plus `/LIBPATH:<dir>`.
    PeCoff,
}

#[derive(Clone, Debug)]
pub struct ToolchainPaths {
    pub compiler: PathBuf,
    pub archiver: PathBuf,
}

#[derive(Clone, Debug)]
pub struct BuildConfig {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub jobs: usize,
    pub fail_fast: bool,
    pub verbose: bool,
    pub force_rebuild: bool,
    pub platform: Platform,
    pub toolchain: ToolchainPaths,
    /// The one environment fallback named by the spec: a module-search path
    /// consulted only when the dependency-scan shim degrades to lexical
    /// mode. Read by the binary crate from `ARIAMAKE_MODULE_PATH` and
    /// handed in here — the library itself never reads the environment.
    pub module_search_path: Option<PathBuf>,
}

impl BuildConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub fn compdb_file(&self) -> PathBuf {
        self.project_root.join("compile_commands.json")
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            state_dir: PathBuf::from(".ariamake"),
            jobs: num_cpus::get(),
            fail_fast: false,
            verbose: false,
            force_rebuild: false,
            platform: default_platform(),
            toolchain: ToolchainPaths { compiler: PathBuf::from("aria-cc"), archiver: PathBuf::from("aria-ar") },
            module_search_path: None,
        }
    }
}

#[cfg(target_os = "windows")]
fn default_platform() -> Platform {
    Platform::PeCoff
}

#[cfg(not(target_os = "windows"))]
fn default_platform() -> Platform {
    Platform::Elf
}
