//! Command synthesizer: pure translation from a target + toolchain info into
//! the argv(s) needed to build it, plus the FNV-1a digest of each.

use std::path::{Path, PathBuf};

use crate::config::{Platform, ToolchainPaths};
use crate::digest::fnv1a64;
use crate::manifest::{TargetDef, TargetKind};
use crate::toolchain::ToolchainInfo;

/// The flag pair used to ask the compiler to emit its dependency list
/// instead of compiling, per the toolchain contract.
pub const EMIT_DEPS_FLAG: &str = "--emit-deps";

#[derive(Clone, Debug)]
pub struct CompileStep {
    pub source: PathBuf,
    pub object: PathBuf,
    pub argv: Vec<String>,
    pub digest: u64,
}

#[derive(Clone, Debug)]
pub struct LinkStep {
    pub argv: Vec<String>,
    pub digest: u64,
}

#[derive(Clone, Debug)]
pub struct SynthesizedCommands {
    pub compiles: Vec<CompileStep>,
    pub link_or_archive: Option<LinkStep>,
}

/// Per-target object directory: `<state_dir>/obj/<target_name>/`.
pub fn object_dir(state_dir: &Path, target_name: &str) -> PathBuf {
    state_dir.join("obj").join(target_name)
}

fn object_path(state_dir: &Path, target_name: &str, source: &Path) -> PathBuf {
    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    object_dir(state_dir, target_name).join(format!("{stem}.o"))
}

/// Synthesizes the compile step(s) and, if applicable, the link/archive
/// step for `target`. `include_roots` are `-I` roots derived from the
/// target's own dependencies (transitive `library_search_paths` are passed
/// separately, folded into the link step).
pub fn synthesize(
    target: &TargetDef,
    toolchain: &ToolchainInfo,
    toolchain_paths: &ToolchainPaths,
    transitive_libs: &[String],
    library_search_paths: &[PathBuf],
    include_roots: &[PathBuf],
    state_dir: &Path,
    platform: Platform,
) -> SynthesizedCommands {
    if !target.kind.produces_compile_steps() {
        return SynthesizedCommands { compiles: Vec::new(), link_or_archive: None };
    }

    let compiles: Vec<CompileStep> = target
        .sources
        .iter()
        .map(|source| {
            let object = object_path(state_dir, &target.name, source);
            let mut argv = vec![source.display().to_string()];
            argv.push("-o".into());
            argv.push(object.display().to_string());
            for root in include_roots {
                argv.push("-I".into());
                argv.push(root.display().to_string());
            }
            argv.extend(target.compile_flags.iter().cloned());

            let digest = fnv1a64(
                std::iter::once(toolchain_paths.compiler.display().to_string())
                    .chain(argv.iter().cloned())
                    .chain(std::iter::once(toolchain.version_string.clone())),
            );

            CompileStep { source: source.clone(), object, argv, digest }
        })
        .collect();

    let link_or_archive = match target.kind {
        TargetKind::StaticLibrary => {
            let mut argv = vec!["rcs".to_string(), target.output.display().to_string()];
            argv.extend(compiles.iter().map(|c| c.object.display().to_string()));
            let digest = fnv1a64(
                std::iter::once(toolchain_paths.archiver.display().to_string())
                    .chain(argv.iter().cloned())
                    .chain(std::iter::once(toolchain.version_string.clone())),
            );
            Some(LinkStep { argv, digest })
        }
        TargetKind::Executable | TargetKind::Test => {
            let mut argv: Vec<String> =
                compiles.iter().map(|c| c.object.display().to_string()).collect();
            argv.push("-o".into());
            argv.push(target.output.display().to_string());
            argv.extend(target.link_flags.iter().cloned());
            argv.extend(library_flags(platform, transitive_libs, library_search_paths));

            let digest = fnv1a64(
                std::iter::once(toolchain_paths.compiler.display().to_string())
                    .chain(argv.iter().cloned())
                    .chain(std::iter::once(toolchain.version_string.clone())),
            );
            Some(LinkStep { argv, digest })
        }
        TargetKind::Object | TargetKind::Custom => None,
    };

    SynthesizedCommands { compiles, link_or_archive }
}

fn library_flags(platform: Platform, libs: &[String], search_paths: &[PathBuf]) -> Vec<String> {
    let mut out = Vec::new();
    match platform {
        Platform::Elf => {
            for dir in search_paths {
                out.push(format!("-L{}", dir.display()));
            }
            for lib in libs {
                out.push(format!("-l{lib}"));
            }
        }
        Platform::PeCoff => {
            for dir in search_paths {
                out.push(format!("/LIBPATH:{}", dir.display()));
            }
            for lib in libs {
                out.push(format!("{lib}.lib"));
            }
        }
    }
    out
}

/// The argv used to ask the compiler for its dependency list for one
/// source, per the toolchain contract's Dependency scan behavior.
pub fn emit_deps_argv(source: &Path) -> Vec<String> {
    vec![source.display().to_string(), EMIT_DEPS_FLAG.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::TargetDef;

    fn toolchain() -> ToolchainInfo {
        ToolchainInfo { binary: "aria-cc".into(), version_string: "aria-cc 1.0.0".into() }
    }

    fn toolchain_paths() -> ToolchainPaths {
        ToolchainPaths { compiler: "aria-cc".into(), archiver: "aria-ar".into() }
    }

    fn target(flags: Vec<String>) -> TargetDef {
        TargetDef {
            name: "app".into(),
            kind: TargetKind::Executable,
            sources: vec!["src/main.aria".into()],
            direct_deps: vec![],
            compile_flags: flags,
            link_flags: vec![],
            libraries: vec![],
            library_search_paths: vec![],
            output: "build/app".into(),
            extra_artifacts: vec![],
            working_dir: None,
        }
    }

    #[test]
    fn flag_change_changes_digest() {
        let t1 = target(vec!["-O0".into()]);
        let t2 = target(vec!["-O2".into()]);
        let c1 = synthesize(&t1, &toolchain(), &toolchain_paths(), &[], &[], &[], Path::new(".st"), Platform::Elf);
        let c2 = synthesize(&t2, &toolchain(), &toolchain_paths(), &[], &[], &[], Path::new(".st"), Platform::Elf);
        assert_ne!(c1.compiles[0].digest, c2.compiles[0].digest);
    }

    #[test]
    fn toolchain_version_is_folded_into_digest() {
        let t = target(vec![]);
        let tc1 = toolchain();
        let mut tc2 = toolchain();
        tc2.version_string = "aria-cc 2.0.0".into();
        let c1 = synthesize(&t, &tc1, &toolchain_paths(), &[], &[], &[], Path::new(".st"), Platform::Elf);
        let c2 = synthesize(&t, &tc2, &toolchain_paths(), &[], &[], &[], Path::new(".st"), Platform::Elf);
        assert_ne!(c1.compiles[0].digest, c2.compiles[0].digest);
    }

    #[test]
    fn elf_library_flags_use_dash_l() {
        let flags = library_flags(Platform::Elf, &["m".to_string()], &[PathBuf::from("/lib")]);
        assert_eq!(flags, vec!["-L/lib".to_string(), "-lm".to_string()]);
    }

    #[test]
    fn pecoff_library_flags_use_libpath() {
        let flags = library_flags(Platform::PeCoff, &["m".to_string()], &[PathBuf::from("C:/lib")]);
        assert_eq!(flags, vec!["/LIBPATH:C:/lib".to_string(), "m.lib".to_string()]);
    }

    #[test]
    fn static_library_synthesizes_archive_step() {
        let mut t = target(vec![]);
        t.kind = TargetKind::StaticLibrary;
        t.sources = vec!["a.aria".into(), "b.aria".into()];
        let c = synthesize(&t, &toolchain(), &toolchain_paths(), &[], &[], &[], Path::new(".st"), Platform::Elf);
        assert_eq!(c.compiles.len(), 2);
        let link = c.link_or_archive.unwrap();
        assert_eq!(link.argv[0], "rcs");
    }

    #[test]
    fn custom_target_has_no_compile_steps() {
        let mut t = target(vec![]);
        t.kind = TargetKind::Custom;
        t.sources.clear();
        let c = synthesize(&t, &toolchain(), &toolchain_paths(), &[], &[], &[], Path::new(".st"), Platform::Elf);
        assert!(c.compiles.is_empty());
        assert!(c.link_or_archive.is_none());
    }
}
