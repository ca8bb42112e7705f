//! Tri-color DFS cycle validator.
//!
//! Runs once before scheduling; a cycle is fatal and no build work is
//! performed. Iterative, not recursive, so pathological dependency depths
//! from generated manifests never blow the call stack.

use crate::graph::{Graph, NodeId};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// `Ok(())` if the graph has no directed cycle, otherwise the offending path
/// as target names: `[name, ..., first_name_repeated]`.
pub fn validate(graph: &Graph) -> Result<(), Vec<String>> {
    let n = graph.node_count();
    let mut color = vec![Color::White; n];

    // Iterative DFS. Each stack frame tracks the node and an index into its
    // dependency list so we can resume after visiting a child.
    for start in graph.node_ids() {
        if color[start.0 as usize] != Color::White {
            continue;
        }

        let mut path: Vec<NodeId> = Vec::new();
        let mut frames: Vec<(NodeId, usize)> = vec![(start, 0)];
        color[start.0 as usize] = Color::Gray;
        path.push(start);

        while let Some((node, next_child)) = frames.pop() {
            let deps = graph.dependencies(node);
            if next_child < deps.len() {
                let child = deps[next_child];
                frames.push((node, next_child + 1));

                match color[child.0 as usize] {
                    Color::White => {
                        color[child.0 as usize] = Color::Gray;
                        path.push(child);
                        frames.push((child, 0));
                    }
                    Color::Gray => {
                        let start_idx =
                            path.iter().position(|&id| id == child).expect("gray node on path");
                        let mut cycle: Vec<String> =
                            path[start_idx..].iter().map(|&id| graph.name(id).to_string()).collect();
                        cycle.push(graph.name(child).to_string());
                        return Err(cycle);
                    }
                    Color::Black => {}
                }
            } else {
                color[node.0 as usize] = Color::Black;
                path.pop();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{TargetDef, TargetKind};
    use std::path::PathBuf;

    fn target(name: &str) -> TargetDef {
        TargetDef {
            name: name.to_string(),
            kind: TargetKind::Executable,
            sources: vec!["a.aria".into()],
            direct_deps: vec![],
            compile_flags: vec![],
            link_flags: vec![],
            libraries: vec![],
            library_search_paths: vec![],
            output: PathBuf::from(format!("build/{name}")),
            extra_artifacts: vec![],
            working_dir: None,
        }
    }

    #[test]
    fn no_cycle_in_diamond() {
        let mut g = Graph::new();
        for n in ["core", "lib_a", "lib_b", "app"] {
            g.add_target(n.into(), target(n)).unwrap();
        }
        g.add_edge("lib_a", "core").unwrap();
        g.add_edge("lib_b", "core").unwrap();
        g.add_edge("app", "lib_a").unwrap();
        g.add_edge("app", "lib_b").unwrap();
        assert!(validate(&g).is_ok());
    }

    #[test]
    fn detects_simple_cycle() {
        let mut g = Graph::new();
        for n in ["x", "y", "z"] {
            g.add_target(n.into(), target(n)).unwrap();
        }
        g.add_edge("x", "y").unwrap();
        g.add_edge("y", "z").unwrap();
        g.add_edge("z", "x").unwrap();

        let err = validate(&g).unwrap_err();
        assert_eq!(err.first(), err.last());
        assert_eq!(err, vec!["x", "y", "z", "x"]);
        let unique: std::collections::HashSet<_> = err[..err.len() - 1].iter().collect();
        assert_eq!(unique.len(), err.len() - 1);
    }

    #[test]
    fn self_cycle_detected() {
        let mut g = Graph::new();
        g.add_target("a".into(), target("a")).unwrap();
        g.add_edge("a", "a").unwrap();
        let err = validate(&g).unwrap_err();
        assert_eq!(err, vec!["a", "a"]);
    }
}
