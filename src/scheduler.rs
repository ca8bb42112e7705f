//! The scheduler: Kahn's algorithm driven reactively by task completion.
//!
//! Completion events funnel through one `mpsc` channel drained on the
//! calling thread, so the in-degree bookkeeping below only ever has one
//! reader — the atomics are kept anyway, matching how a future caller
//! that wants to read `NodeRuntime::in_degree` for diagnostics from another
//! thread would expect them to behave.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;

use crate::error::{AriaError, Result};
use crate::graph::{Graph, NodeId, NodeRuntime, NodeStatus};
use crate::pool::WorkerPool;
use crate::report::Reporter;

#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulePolicy {
    pub fail_fast: bool,
}

#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub completed: Vec<String>,
    pub failed: Vec<(String, AriaError)>,
    pub skipped_up_to_date: Vec<String>,
    /// Dirty nodes never submitted because `fail_fast` aborted the run
    /// before their dependencies finished.
    pub not_attempted: Vec<String>,
}

impl ScheduleOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }
}

enum Completion {
    Done(NodeId, Result<()>),
}

/// Drives `execute` to completion over every dirty node in `graph`, in
/// dependency order, fanning out independent work across `pool`.
///
/// `execute` runs on a pool worker thread per dirty node; it is expected to
/// synthesize and run that node's build commands and persist its state —
/// the scheduler itself performs no I/O.
pub fn run(
    graph: &Graph,
    runtime: &[NodeRuntime],
    pool: &WorkerPool,
    policy: SchedulePolicy,
    reporter: &dyn Reporter,
    execute: Arc<dyn Fn(NodeId) -> Result<()> + Send + Sync>,
) -> ScheduleOutcome {
    let mut outcome = ScheduleOutcome::default();
    let node_ids: Vec<NodeId> = graph.node_ids().collect();
    let total = node_ids.len();

    let dirty: HashSet<NodeId> = node_ids.iter().copied().filter(|id| runtime[id.0 as usize].is_dirty()).collect();

    for &id in &node_ids {
        if !dirty.contains(&id) {
            runtime[id.0 as usize].set_status(NodeStatus::SkippedUpToDate);
            outcome.skipped_up_to_date.push(graph.name(id).to_string());
            reporter.on_target_done(graph.name(id), true);
        }
    }

    // Recompute each dirty node's in-degree counting only dirty
    // dependencies: a non-dirty dependency is already satisfied and should
    // never hold up scheduling.
    for &id in &dirty {
        let dirty_deps = graph.dependencies(id).iter().filter(|d| dirty.contains(d)).count() as u32;
        runtime[id.0 as usize].in_degree.store(dirty_deps, Ordering::Release);
    }

    let (tx, rx) = mpsc::channel::<Completion>();
    let aborted = std::sync::atomic::AtomicBool::new(false);
    let mut in_flight: usize = 0;

    let total_dirty = dirty.len();
    let submit = |id: NodeId, in_flight: &mut usize| {
        runtime[id.0 as usize].set_status(NodeStatus::Building);
        reporter.on_target_start(graph.name(id));
        let tx = tx.clone();
        let execute = Arc::clone(&execute);
        *in_flight += 1;
        pool.submit(move || {
            let result = execute(id);
            let _ = tx.send(Completion::Done(id, result));
        });
    };

    let mut initial_ready: Vec<NodeId> = dirty
        .iter()
        .copied()
        .filter(|id| runtime[id.0 as usize].in_degree.load(Ordering::Acquire) == 0)
        .collect();
    initial_ready.sort_by_key(|id| graph.name(*id).to_string());
    for id in initial_ready {
        submit(id, &mut in_flight);
    }

    // Nodes whose reverse-dependency set has already been marked failed,
    // kept so a broad fan-in failure doesn't re-walk the same subtree.
    let mut marked_failed: HashSet<NodeId> = HashSet::new();

    while in_flight > 0 {
        let Completion::Done(id, result) = rx.recv().expect("at least one sender remains while in_flight > 0");
        in_flight -= 1;
        let name = graph.name(id).to_string();

        match result {
            Ok(()) => {
                runtime[id.0 as usize].set_status(NodeStatus::Completed);
                reporter.on_target_done(&name, false);
                outcome.completed.push(name);
                reporter.on_phase("build", outcome.completed.len() + outcome.failed.len(), total_dirty);

                for &dependent in graph.dependents(id) {
                    if !dirty.contains(&dependent) || marked_failed.contains(&dependent) {
                        continue;
                    }
                    let prev = runtime[dependent.0 as usize].in_degree.fetch_sub(1, Ordering::AcqRel);
                    if prev == 1 && !aborted.load(Ordering::Acquire) {
                        submit(dependent, &mut in_flight);
                    }
                }
            }
            Err(err) => {
                runtime[id.0 as usize].set_status(NodeStatus::Failed);
                reporter.on_diagnostic(err.tag(), Some(&name), &err.to_string());
                marked_failed.insert(id);
                mark_transitive_dependents_failed(graph, runtime, id, &mut marked_failed, reporter);
                outcome.failed.push((name, err));
                reporter.on_phase("build", outcome.completed.len() + outcome.failed.len(), total_dirty);
                if policy.fail_fast {
                    aborted.store(true, Ordering::Release);
                }
            }
        }
    }

    for &id in &dirty {
        match runtime[id.0 as usize].status() {
            NodeStatus::Completed | NodeStatus::Failed => {}
            _ => outcome.not_attempted.push(graph.name(id).to_string()),
        }
    }

    debug_assert_eq!(
        outcome.completed.len() + outcome.failed.len() + outcome.skipped_up_to_date.len() + outcome.not_attempted.len(),
        total
    );

    outcome
}

/// BFS over `dependents`, marking every still-eligible dirty descendant of
/// `failed` as `Failed` without ever submitting it.
fn mark_transitive_dependents_failed(
    graph: &Graph,
    runtime: &[NodeRuntime],
    failed: NodeId,
    marked: &mut HashSet<NodeId>,
    reporter: &dyn Reporter,
) {
    let mut queue: std::collections::VecDeque<NodeId> = graph.dependents(failed).iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        if !marked.insert(id) {
            continue;
        }
        if !runtime[id.0 as usize].is_dirty() {
            continue;
        }
        runtime[id.0 as usize].set_status(NodeStatus::Failed);
        reporter.on_diagnostic(
            "dependency_failed",
            Some(graph.name(id)),
            &format!("skipped: depends on failed target `{}`", graph.name(failed)),
        );
        queue.extend(graph.dependents(id).iter().copied());
    }
}
