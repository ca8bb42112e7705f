//! Dependency-scan shim: asks the compiler itself which files a source
//! transitively imports, so the dirty analyzer's `implicit_deps` are
//! accurate. Falls back to a lexical import scan when the compiler's
//! dependency-emission path fails or returns an unparseable payload.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::command::emit_deps_argv;
use crate::config::ToolchainPaths;
use crate::pal::{self, ExecOptions};

/// Schema pinned exactly as the open question resolves it: unknown fields
/// are rejected rather than silently ignored, since a payload that almost
/// matches is more dangerous than one that's visibly absent.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScanPayload {
    #[allow(dead_code)]
    source: String,
    imports: Vec<ImportEntry>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImportEntry {
    module: String,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ScanResult {
    pub imports: Vec<Import>,
    /// Set when the compiler-native scan failed or its payload was
    /// unparseable and the lexical fallback was used instead.
    pub degraded: bool,
}

/// Matches `import "path.to.module";` or `import path.to.module;`, loosely
/// enough to survive minor grammar variation in a best-effort fallback.
static RE_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s+(?:"(?P<quoted>[^"]+)"|(?P<bare>[\w.]+))\s*;"#).unwrap());

pub fn scan(
    toolchain_paths: &ToolchainPaths,
    source: &Path,
    module_search_path: Option<&Path>,
    working_dir: Option<&Path>,
) -> ScanResult {
    match scan_native(toolchain_paths, source, working_dir) {
        Some(imports) => ScanResult { imports, degraded: false },
        None => ScanResult { imports: lexical_scan(source, module_search_path), degraded: true },
    }
}

fn scan_native(toolchain_paths: &ToolchainPaths, source: &Path, working_dir: Option<&Path>) -> Option<Vec<Import>> {
    let argv = emit_deps_argv(source);
    let options = ExecOptions { working_dir: working_dir.map(Path::to_path_buf), ..Default::default() };
    let result = pal::execute(&toolchain_paths.compiler, &argv, &options).ok()?;
    if !result.success() {
        return None;
    }
    let payload: ScanPayload = serde_json::from_slice(&result.stdout).ok()?;
    if payload.error.is_some() {
        return None;
    }
    Some(payload.imports.into_iter().map(|e| Import { module: e.module, path: e.path }).collect())
}

/// Best-effort regex scrape, grounded in the same `once_cell::sync::Lazy<Regex>`
/// idiom used elsewhere in this codebase for source-text pattern matching.
/// Resolves a bare dotted module name against `module_search_path` when set,
/// otherwise leaves it as a relative guess next to the source file.
fn lexical_scan(source: &Path, module_search_path: Option<&Path>) -> Vec<Import> {
    let Ok(text) = std::fs::read_to_string(source) else {
        return Vec::new();
    };

    RE_IMPORT
        .captures_iter(&text)
        .map(|caps| {
            let module = caps
                .name("quoted")
                .or_else(|| caps.name("bare"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let rel = module.replace('.', "/") + ".aria";
            let path = match module_search_path {
                Some(root) => root.join(&rel),
                None => source.parent().map(|p| p.join(&rel)).unwrap_or_else(|| PathBuf::from(&rel)),
            };
            Import { module, path }
        })
        .collect()
}
