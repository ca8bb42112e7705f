//! The dirty analyzer.
//!
//! Single topological pass computing each node's dirty bit as the logical OR
//! of the seven conditions in the build design, followed by a propagation
//! pass that ORs dirtiness into every transitive reverse-dependency before
//! scheduling begins.

use crate::error::Result;
use crate::graph::{Graph, NodeRuntime};
use crate::report::Reporter;
use crate::state::PersistedState;
use crate::toolchain::ToolchainInfo;
use crate::util::mtime_ticks;

pub fn analyze(
    graph: &Graph,
    runtime: &[NodeRuntime],
    state: &PersistedState,
    toolchain: &ToolchainInfo,
    force: bool,
    reporter: &dyn Reporter,
) -> Result<()> {
    for id in graph.topological_order() {
        let rt = &runtime[id.0 as usize];

        if force {
            rt.set_dirty(true);
            continue;
        }

        let target = graph.target(id);
        let dirty = is_dirty(graph, runtime, state, toolchain, &target.name, reporter)?;
        rt.set_dirty(dirty);
    }

    // Propagation: a second forward pass ORs dependency dirtiness into every
    // dependent. Topological order guarantees each dependency is finalized
    // before any of its dependents are visited.
    for id in graph.topological_order() {
        let rt = &runtime[id.0 as usize];
        if rt.is_dirty() {
            continue;
        }
        let inherited = graph.dependencies(id).iter().any(|dep| runtime[dep.0 as usize].is_dirty());
        if inherited {
            rt.set_dirty(true);
        }
    }

    Ok(())
}

fn is_dirty(
    graph: &Graph,
    runtime: &[NodeRuntime],
    state: &PersistedState,
    toolchain: &ToolchainInfo,
    name: &str,
    reporter: &dyn Reporter,
) -> Result<bool> {
    let target = graph.target(graph.node_id(name).expect("node exists"));

    if !target.output.exists() {
        return Ok(true);
    }

    let Some(record) = state.record(name) else {
        return Ok(true);
    };

    if record.toolchain_version != toolchain.version_string {
        return Ok(true);
    }

    let id = graph.node_id(name).expect("node exists");
    {
        let (compile_digest, link_digest) = *runtime[id.0 as usize].command_digest.lock().unwrap();
        if let Some(compile_digest) = compile_digest {
            if compile_digest != record.command_digest {
                return Ok(true);
            }
        }
        if link_digest != record.link_digest {
            return Ok(true);
        }
    }

    let output_mtime = mtime_ticks(&target.output);

    for source in &target.sources {
        match mtime_ticks(source) {
            None => {
                reporter.on_diagnostic(
                    "dirty_analysis",
                    Some(name),
                    &format!("could not stat source `{}`", source.display()),
                );
                return Ok(true);
            }
            Some(current) => match record.source_stamps.get(source) {
                None => return Ok(true),
                Some(&stamp) if current > stamp => return Ok(true),
                Some(_) => {}
            },
        }
    }

    for (path, stamp) in &record.implicit_deps {
        match mtime_ticks(path) {
            None => return Ok(true),
            Some(current) if current > *stamp => return Ok(true),
            Some(_) => {}
        }
    }

    for dep_output in &record.dependency_outputs {
        if let Some(dep_mtime) = mtime_ticks(dep_output) {
            if let Some(out) = output_mtime {
                if dep_mtime > out {
                    return Ok(true);
                }
            }
        }
    }

    for &dep_id in graph.dependencies(graph.node_id(name).expect("node exists")) {
        if runtime[dep_id.0 as usize].is_dirty() {
            return Ok(true);
        }
    }

    Ok(false)
}
