//! The dependency graph.
//!
//! Targets live in a contiguous arena indexed by a stable [`NodeId`]; edges
//! are plain `Vec<NodeId>`. This sidesteps the owning-node/weak-edge
//! reference tangle the arena replaces: once construction finishes the graph
//! is immutable and trivially `Sync`, so every worker thread can read
//! topology without synchronization.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use crate::manifest::TargetDef;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u32);

#[derive(Debug)]
pub struct GraphError(String);

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::error::Error for GraphError {}

struct Node {
    target: TargetDef,
    dependencies: Vec<NodeId>,
    dependents: Vec<NodeId>,
}

/// Per-node state mutated during a build and reset at the start of each run.
///
/// Kept in a parallel array (not inside [`Node`]) so an immutable `&Graph`
/// can be shared read-only across worker threads while this array is the
/// only thing mutated, and mutated through atomics rather than a lock.
pub struct NodeRuntime {
    pub in_degree: AtomicU32,
    status: AtomicU8,
    dirty: AtomicBool,
    /// Compile digest and, for linking/archiving targets, a separate
    /// link/archive digest.
    pub command_digest: Mutex<(Option<u64>, Option<u64>)>,
    pub last_built_at: Mutex<Option<i64>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum NodeStatus {
    NotStarted = 0,
    Pending = 1,
    Building = 2,
    Completed = 3,
    Failed = 4,
    SkippedUpToDate = 5,
}

impl From<u8> for NodeStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Pending,
            2 => Self::Building,
            3 => Self::Completed,
            4 => Self::Failed,
            5 => Self::SkippedUpToDate,
            _ => Self::NotStarted,
        }
    }
}

impl NodeRuntime {
    fn new(out_degree: u32) -> Self {
        Self {
            in_degree: AtomicU32::new(out_degree),
            status: AtomicU8::new(NodeStatus::NotStarted as u8),
            dirty: AtomicBool::new(false),
            command_digest: Mutex::new((None, None)),
            last_built_at: Mutex::new(None),
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus::from(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: NodeStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }
}

/// Exclusively owns the set of targets. Edges are non-owning `NodeId`
/// references safe only for the graph's scope.
pub struct Graph {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    edges_seen: HashSet<(NodeId, NodeId)>,
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), by_name: HashMap::new(), edges_seen: HashSet::new() }
    }

    pub fn add_target(&mut self, name: String, target: TargetDef) -> Result<NodeId, GraphError> {
        if self.by_name.contains_key(&name) {
            return Err(GraphError(format!("duplicate target name `{name}`")));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { target, dependencies: Vec::new(), dependents: Vec::new() });
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Adds a dependent -> dependency edge. Idempotent: re-adding the same
    /// edge is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let from_id =
            *self.by_name.get(from).ok_or_else(|| GraphError(format!("unknown target `{from}`")))?;
        let to_id =
            *self.by_name.get(to).ok_or_else(|| GraphError(format!("unknown target `{to}`")))?;

        if !self.edges_seen.insert((from_id, to_id)) {
            return Ok(());
        }

        self.nodes[from_id.0 as usize].dependencies.push(to_id);
        self.nodes[to_id.0 as usize].dependents.push(from_id);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0 as usize].target.name
    }

    pub fn target(&self, id: NodeId) -> &TargetDef {
        &self.nodes[id.0 as usize].target
    }

    pub fn dependencies(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0 as usize].dependencies
    }

    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0 as usize].dependents
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Builds a fresh runtime-state array: `in_degree` set to each node's
    /// static out-degree (the count of its own unmet dependencies), status
    /// `NotStarted`, dirty `false`.
    pub fn fresh_runtime_state(&self) -> Vec<NodeRuntime> {
        self.nodes.iter().map(|n| NodeRuntime::new(n.dependencies.len() as u32)).collect()
    }

    /// Resets an existing runtime-state array in place, for re-entrant calls
    /// on the same `Build` (the one concession made to watch-mode callers).
    pub fn reset_runtime_state(&self, runtime: &[NodeRuntime]) {
        for (node, rt) in self.nodes.iter().zip(runtime) {
            rt.in_degree.store(node.dependencies.len() as u32, Ordering::Release);
            rt.set_status(NodeStatus::NotStarted);
            rt.set_dirty(false);
        }
    }

    /// Kahn's algorithm over `dependencies` edges, breaking ties between
    /// simultaneously-ready nodes by ascending target name so that logs and
    /// the compilation database are reproducible.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: Vec<u32> =
            self.nodes.iter().map(|n| n.dependencies.len() as u32).collect();

        let mut ready: Vec<NodeId> =
            self.node_ids().filter(|id| in_degree[id.0 as usize] == 0).collect();
        ready.sort_by_key(|id| self.name(*id).to_string());

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut i = 0;
        while i < ready.len() {
            let current = ready[i];
            i += 1;
            order.push(current);

            let mut newly_ready = Vec::new();
            for &dependent in &self.nodes[current.0 as usize].dependents {
                let slot = &mut in_degree[dependent.0 as usize];
                *slot -= 1;
                if *slot == 0 {
                    newly_ready.push(dependent);
                }
            }
            newly_ready.sort_by_key(|id| self.name(*id).to_string());
            ready.extend(newly_ready);
        }

        order
    }

    /// Breadth-first union of `libraries` over `start` and every reachable
    /// dependency, duplicates removed preserving first occurrence, then
    /// stable-sorted. The command synthesizer treats this as the complete
    /// link-time library set for `start` — it does not separately re-add
    /// `start`'s own `libraries`.
    pub fn collect_transitive_libraries(&self, start: NodeId) -> Vec<String> {
        let mut seen_nodes = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        seen_nodes.insert(start);

        let mut seen_libs = HashSet::new();
        let mut libs = Vec::new();
        while let Some(id) = queue.pop_front() {
            for &dep in &self.nodes[id.0 as usize].dependencies {
                if seen_nodes.insert(dep) {
                    queue.push_back(dep);
                }
            }
            for lib in &self.nodes[id.0 as usize].target.libraries {
                if seen_libs.insert(lib.clone()) {
                    libs.push(lib.clone());
                }
            }
        }
        libs.sort();
        libs
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::TargetKind;

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

    use std::path::PathBuf;

    #[test]
    fn topo_order_breaks_ties_by_name() {
        let mut g = Graph::new();
        g.add_target("b".into(), target("b")).unwrap();
        g.add_target("a".into(), target("a")).unwrap();
        let order: Vec<_> = g.topological_order().iter().map(|id| g.name(*id).to_string()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn diamond_topo_order_is_valid() {
        let mut g = Graph::new();
        g.add_target("core".into(), target("core")).unwrap();
        g.add_target("lib_a".into(), target("lib_a")).unwrap();
        g.add_target("lib_b".into(), target("lib_b")).unwrap();
        g.add_target("app".into(), target("app")).unwrap();
        g.add_edge("lib_a", "core").unwrap();
        g.add_edge("lib_b", "core").unwrap();
        g.add_edge("app", "lib_a").unwrap();
        g.add_edge("app", "lib_b").unwrap();

        let order = g.topological_order();
        let pos = |n: &str| order.iter().position(|id| g.name(*id) == n).unwrap();
        assert!(pos("core") < pos("lib_a"));
        assert!(pos("core") < pos("lib_b"));
        assert!(pos("lib_a") < pos("app"));
        assert!(pos("lib_b") < pos("app"));
    }

    #[test]
    fn add_edge_is_idempotent() {
        let mut g = Graph::new();
        g.add_target("a".into(), target("a")).unwrap();
        g.add_target("b".into(), target("b")).unwrap();
        g.add_edge("a", "b").unwrap();
        g.add_edge("a", "b").unwrap();
        assert_eq!(g.dependencies(g.node_id("a").unwrap()).len(), 1);
        assert_eq!(g.dependents(g.node_id("b").unwrap()).len(), 1);
    }

    #[test]
    fn unknown_edge_target_errors() {
        let mut g = Graph::new();
        g.add_target("a".into(), target("a")).unwrap();
        assert!(g.add_edge("a", "ghost").is_err());
    }

    #[test]
    fn collect_transitive_libraries_dedupes_and_sorts() {
        let mut g = Graph::new();
        let mut core = target("core");
        core.libraries = vec!["z".into(), "a".into()];
        let mut lib_a = target("lib_a");
        lib_a.libraries = vec!["a".into(), "m".into()];
        g.add_target("core".into(), core).unwrap();
        g.add_target("lib_a".into(), lib_a).unwrap();
        g.add_target("app".into(), target("app")).unwrap();
        g.add_edge("lib_a", "core").unwrap();
        g.add_edge("app", "lib_a").unwrap();

        let libs = g.collect_transitive_libraries(g.node_id("app").unwrap());
        assert_eq!(libs, vec!["a".to_string(), "m".to_string(), "z".to_string()]);
    }
}
