//! Compilation-database emitter: writes `compile_commands.json` in the
//! project root, describing every compile invocation (link/archive steps
//! excluded) from the just-finished build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::command::SynthesizedCommands;
use crate::error::Result;
use crate::graph::Graph;
use crate::util::write_json_file_atomic;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CompDbEntry {
    directory: String,
    file: String,
    command: String,
    output: String,
}

/// Emits `compile_commands.json` at `path`, one entry per compile step across
/// every target in `graph`'s canonical topological order, sorted by source
/// path for stability.
pub fn emit(
    graph: &Graph,
    commands: &HashMap<String, SynthesizedCommands>,
    project_root: &Path,
    binary: &Path,
    path: &Path,
) -> Result<()> {
    let mut entries = Vec::new();

    for id in graph.topological_order() {
        let name = graph.name(id);
        let Some(synthesized) = commands.get(name) else { continue };
        let directory = graph
            .target(id)
            .working_dir
            .as_deref()
            .unwrap_or(project_root)
            .display()
            .to_string();
        for compile in &synthesized.compiles {
            let argv: Vec<String> = std::iter::once(binary.display().to_string())
                .chain(compile.argv.iter().cloned())
                .collect();
            let command = argv.iter().map(|tok| escape_token(tok)).collect::<Vec<_>>().join(" ");
            entries.push(CompDbEntry {
                directory: directory.clone(),
                file: compile.source.display().to_string(),
                command,
                output: compile.object.display().to_string(),
            });
        }
    }

    entries.sort_by(|a, b| a.file.cmp(&b.file));
    write_json_file_atomic(&entries, path)
}

pub fn default_path(project_root: &Path) -> PathBuf {
    project_root.join("compile_commands.json")
}

/// Escapes one argv token the way a `compile_commands.json` consumer
/// expects: a JSON string body (quotes/backslashes escaped), without the
/// surrounding quote characters, since the whole `command` field is itself
/// one shell-like string rather than a JSON array.
fn escape_token(token: &str) -> String {
    serde_json::to_string(token)
        .map(|quoted| quoted[1..quoted.len() - 1].to_string())
        .unwrap_or_else(|_| token.to_string())
}
