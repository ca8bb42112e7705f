//! Already-resolved build manifest: the core's only input.
//!
//! Everything here is produced by an out-of-scope front-end (the ABC parser,
//! variable interpolation, glob expansion) before the core ever sees it. The
//! core's only job is to validate the shape and ingest it into a [`Graph`].

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AriaError, Result};
use crate::graph::Graph;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    #[default]
    Jit,
    Interpreter,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub test_mode: TestMode,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Executable,
    StaticLibrary,
    Object,
    Test,
    Custom,
}

impl TargetKind {
    pub fn produces_compile_steps(&self) -> bool {
        !matches!(self, Self::Custom)
    }

    pub fn links(&self) -> bool {
        matches!(self, Self::Executable | Self::Test)
    }

    pub fn archives(&self) -> bool {
        matches!(self, Self::StaticLibrary)
    }
}

/// A single build unit, already fully resolved by the front-end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetDef {
    pub name: String,
    pub kind: TargetKind,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default, rename = "dependencies")]
    pub direct_deps: Vec<String>,
    #[serde(default, rename = "flags")]
    pub compile_flags: Vec<String>,
    #[serde(default)]
    pub link_flags: Vec<String>,
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub library_search_paths: Vec<PathBuf>,
    pub output: PathBuf,
    #[serde(default)]
    pub extra_artifacts: Vec<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub project: ProjectInfo,
    pub targets: Vec<TargetDef>,
}

impl Manifest {
    /// Runs every check §6 names plus the filesystem-collision pass from §5:
    /// unique names, non-empty sources unless `custom`, unique outputs
    /// (including `extra_artifacts`), unique library names per target, and
    /// that every `direct_deps` entry names a target that exists.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                return Err(AriaError::manifest(format!(
                    "duplicate target name `{}`",
                    target.name
                )));
            }
        }

        let mut written_paths = HashSet::new();
        for target in &self.targets {
            if target.sources.is_empty() && target.kind != TargetKind::Custom {
                return Err(AriaError::manifest(format!(
                    "target `{}` of kind {:?} has no sources",
                    target.name, target.kind
                )));
            }

            for path in std::iter::once(&target.output).chain(target.extra_artifacts.iter()) {
                if !written_paths.insert(path.clone()) {
                    return Err(AriaError::manifest(format!(
                        "path `{}` is written by more than one target",
                        path.display()
                    )));
                }
            }

            let mut libs = HashSet::new();
            for lib in &target.libraries {
                if !libs.insert(lib.as_str()) {
                    return Err(AriaError::manifest(format!(
                        "target `{}` lists library `{}` more than once",
                        target.name, lib
                    )));
                }
            }

            for dep in &target.direct_deps {
                if !names.contains(dep.as_str()) {
                    return Err(AriaError::manifest(format!(
                        "target `{}` depends on unknown target `{}`",
                        target.name, dep
                    )));
                }
            }
        }

        Ok(())
    }

    /// Ingests targets into a fresh [`Graph`]: creates nodes, then wires
    /// `direct_deps` into edges. Validation is expected to have already run;
    /// this is a second, independent line of defense against unknown edges.
    pub fn into_graph(self) -> Result<Graph> {
        self.validate()?;

        let mut graph = Graph::new();
        for target in &self.targets {
            graph
                .add_target(target.name.clone(), target.clone())
                .map_err(|e| AriaError::manifest(e.to_string()))?;
        }

        for target in &self.targets {
            for dep in &target.direct_deps {
                graph
                    .add_edge(&target.name, dep)
                    .map_err(|e| AriaError::manifest(e.to_string()))?;
            }
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, kind: TargetKind, deps: &[&str]) -> TargetDef {
        TargetDef {
            name: name.to_string(),
            kind,
            sources: if kind == TargetKind::Custom { vec![] } else { vec!["a.aria".into()] },
            direct_deps: deps.iter().map(|s| s.to_string()).collect(),
            compile_flags: vec![],
            link_flags: vec![],
            libraries: vec![],
            library_search_paths: vec![],
            output: PathBuf::from(format!("build/{name}")),
            extra_artifacts: vec![],
            working_dir: None,
        }
    }

    fn project() -> ProjectInfo {
        ProjectInfo { name: "p".into(), version: "0.1.0".into(), test_mode: TestMode::Jit }
    }

    #[test]
    fn rejects_duplicate_names() {
        let m = Manifest {
            project: project(),
            targets: vec![
                target("a", TargetKind::Executable, &[]),
                target("a", TargetKind::Executable, &[]),
            ],
        };
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_empty_sources_unless_custom() {
        let mut t = target("a", TargetKind::Executable, &[]);
        t.sources.clear();
        let m = Manifest { project: project(), targets: vec![t] };
        assert!(m.validate().is_err());

        let mut t = target("a", TargetKind::Custom, &[]);
        t.sources.clear();
        let m = Manifest { project: project(), targets: vec![t] };
        assert!(m.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_output_paths() {
        let mut b = target("b", TargetKind::Executable, &[]);
        b.output = PathBuf::from("build/a");
        let m = Manifest {
            project: project(),
            targets: vec![target("a", TargetKind::Executable, &[]), b],
        };
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let m = Manifest {
            project: project(),
            targets: vec![target("a", TargetKind::Executable, &["ghost"])],
        };
        assert!(m.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_manifest() {
        let m = Manifest {
            project: project(),
            targets: vec![
                target("core", TargetKind::StaticLibrary, &[]),
                target("app", TargetKind::Executable, &["core"]),
            ],
        };
        assert!(m.validate().is_ok());
        assert!(m.into_graph().is_ok());
    }
}
