//! `Build`: owns the graph, persisted state, artifact registry and worker
//! pool for one project root, and orchestrates a full run end to end. The
//! one type the CLI front-end talks to.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::{self, SynthesizedCommands};
use crate::config::BuildConfig;
use crate::cycle;
use crate::depscan;
use crate::dirty;
use crate::error::{AriaError, Result};
use crate::graph::{Graph, NodeId, NodeRuntime};
use crate::manifest::Manifest;
use crate::pal::{self, ExecOptions};
use crate::pool::WorkerPool;
use crate::registry::{ArtifactEntry, ArtifactKind};
use crate::report::Reporter;
use crate::scheduler::{self, SchedulePolicy, ScheduleOutcome};
use crate::state::{PersistedState, StateRecord};
use crate::toolchain::ToolchainInfo;
use crate::util::mtime_ticks;

/// The dirty-analysis + command-synthesis result for a run, without having
/// touched the filesystem beyond reads. What the `check` subcommand stops
/// at.
pub struct Plan {
    pub dirty_targets: Vec<String>,
    pub commands: HashMap<String, SynthesizedCommands>,
}

pub struct Build {
    manifest: Manifest,
    graph: Graph,
    runtime: Vec<NodeRuntime>,
    config: BuildConfig,
    state: PersistedState,
    toolchain: ToolchainInfo,
    /// Non-target imports discovered by the dependency-scan shim, per
    /// target name. Target-matching imports are folded into `graph`'s edges
    /// directly instead and don't appear here.
    implicit_deps: HashMap<String, Vec<PathBuf>>,
}

impl Build {
    /// Validates `manifest`, builds the graph, probes the toolchain once,
    /// and loads persisted state from `config.state_dir`.
    ///
    /// Also runs the dependency-scan shim (§11) over every target's sources
    /// synchronously, here, before the graph is ever shared across worker
    /// threads: target-matching imports become graph edges, everything else
    /// becomes an implicit-dependency entry consulted by dirty analysis.
    pub fn new(manifest: Manifest, config: BuildConfig) -> Result<Self> {
        manifest.validate()?;
        let mut graph = manifest.clone().into_graph()?;
        let toolchain = ToolchainInfo::probe(&config.toolchain.compiler)?;
        let state = PersistedState::load(&config.state_file());
        let implicit_deps = scan_implicit_deps(&mut graph, &config);
        let runtime = graph.fresh_runtime_state();

        Ok(Self { manifest, graph, runtime, config, state, toolchain, implicit_deps })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Runs cycle validation (fatal) then dirty analysis, and synthesizes
    /// commands for every node — dirty or not, since a `check` caller may
    /// want to see what a target *would* run. No filesystem writes.
    pub fn plan(&self, force: bool, reporter: &dyn Reporter) -> Result<Plan> {
        cycle::validate(&self.graph).map_err(|path| AriaError::Cycle { path })?;
        dirty::analyze(&self.graph, &self.runtime, &self.state, &self.toolchain, force, reporter)?;

        let mut commands = HashMap::new();
        let mut dirty_targets = Vec::new();
        for id in self.graph.node_ids() {
            let target = self.graph.target(id);
            let transitive_libs = self.graph.collect_transitive_libraries(id);
            let search_paths = self.collect_search_paths(id);
            let include_roots = self.collect_include_roots(id);

            let synthesized = command::synthesize(
                target,
                &self.toolchain,
                &self.config.toolchain,
                &transitive_libs,
                &search_paths,
                &include_roots,
                &self.config.state_dir,
                self.config.platform,
            );

            {
                let compile_digest = synthesized.compiles.iter().fold(None, |_, step| Some(step.digest));
                let link_digest = synthesized.link_or_archive.as_ref().map(|l| l.digest);
                *self.runtime[id.0 as usize].command_digest.lock().unwrap() = (compile_digest, link_digest);
            }

            if self.runtime[id.0 as usize].is_dirty() {
                dirty_targets.push(target.name.clone());
            }
            commands.insert(target.name.clone(), synthesized);
        }

        Ok(Plan { dirty_targets, commands })
    }

    fn collect_search_paths(&self, id: NodeId) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.graph.target(id).library_search_paths.clone();
        for &dep in self.graph.dependencies(id) {
            paths.extend(self.graph.target(dep).library_search_paths.iter().cloned());
        }
        paths
    }

    fn collect_include_roots(&self, id: NodeId) -> Vec<PathBuf> {
        self.graph
            .dependencies(id)
            .iter()
            .filter_map(|&dep| self.graph.target(dep).output.parent().map(|p| p.to_path_buf()))
            .collect()
    }

    /// Drives the scheduler over `plan`'s dirty set, persisting state and
    /// the artifact registry as each target completes, then emits the
    /// compilation database. Takes `self` behind an `Arc` because each
    /// dirty node's build work runs as a `'static` task on a worker-pool
    /// thread and needs its own handle on the owning `Build`.
    pub fn run(self: &Arc<Self>, plan: &Plan, reporter: Arc<dyn Reporter>) -> Result<ScheduleOutcome> {
        let pool = WorkerPool::new(self.config.jobs);
        let policy = SchedulePolicy { fail_fast: self.config.fail_fast };

        let build = Arc::clone(self);
        let commands = Arc::new(plan.commands.clone());
        let execute: Arc<dyn Fn(NodeId) -> Result<()> + Send + Sync> = {
            let reporter = Arc::clone(&reporter);
            Arc::new(move |id: NodeId| build.execute_one(id, &commands, reporter.as_ref()))
        };

        let outcome = scheduler::run(&self.graph, &self.runtime, &pool, policy, reporter.as_ref(), execute);
        pool.shutdown();

        self.state.save(&self.config.state_file())?;
        crate::compdb::emit(
            &self.graph,
            &plan.commands,
            &self.config.project_root,
            &self.config.toolchain.compiler,
            &self.config.compdb_file(),
        )?;

        Ok(outcome)
    }

    /// Full-force convenience wrapper: resets runtime state, replans with
    /// `force = true`, then runs.
    pub fn rebuild(self: &Arc<Self>, reporter: Arc<dyn Reporter>) -> Result<ScheduleOutcome> {
        self.graph.reset_runtime_state(&self.runtime);
        let plan = self.plan(true, reporter.as_ref())?;
        self.run(&plan, reporter)
    }

    pub fn clean(&self, target: Option<&str>, dry_run: bool, reporter: &dyn Reporter) -> Result<crate::clean::CleanReport> {
        match target {
            Some(name) => Ok(crate::clean::clean_target(&self.state, name, dry_run, reporter)),
            None => crate::clean::full_clean(&self.state, &self.config.state_file(), dry_run, reporter),
        }
    }

    pub fn clean_orphans(&self, dry_run: bool, reporter: &dyn Reporter) -> Result<crate::clean::CleanReport> {
        crate::clean::clean_orphans(&self.state, &self.config.state_file(), &self.manifest, dry_run, reporter)
    }

    fn execute_one(&self, id: NodeId, commands: &HashMap<String, SynthesizedCommands>, reporter: &dyn Reporter) -> Result<()> {
        let target = self.graph.target(id);
        let name = target.name.clone();

        let synthesized = commands.get(&name).expect("plan synthesized commands for every node");

        let exec_options = ExecOptions {
            working_dir: target.working_dir.clone().or_else(|| Some(self.config.project_root.clone())),
            ..Default::default()
        };

        for compile in &synthesized.compiles {
            crate::util::create_parent_dir_all(&compile.object)?;
            let result = pal::execute(&self.config.toolchain.compiler, &compile.argv, &exec_options)?;
            if !result.success() {
                return Err(AriaError::from_exec(name.clone(), &result));
            }
        }

        if let Some(link) = &synthesized.link_or_archive {
            crate::util::create_parent_dir_all(&target.output)?;
            let binary =
                if target.kind.archives() { &self.config.toolchain.archiver } else { &self.config.toolchain.compiler };
            let result = pal::execute(binary, &link.argv, &exec_options)?;
            if !result.success() {
                return Err(AriaError::from_exec(name.clone(), &result));
            }
        }

        self.record_success(id)?;
        reporter.on_target_done(&name, false);
        Ok(())
    }

    fn record_success(&self, id: NodeId) -> Result<()> {
        let target = self.graph.target(id);

        let mut source_stamps = std::collections::BTreeMap::new();
        for source in &target.sources {
            if let Some(tick) = mtime_ticks(source) {
                source_stamps.insert(source.clone(), tick);
            }
        }

        let dependency_outputs: Vec<PathBuf> =
            self.graph.dependencies(id).iter().map(|&dep| self.graph.target(dep).output.clone()).collect();

        let (compile_digest, link_digest) = *self.runtime[id.0 as usize].command_digest.lock().unwrap();

        let mut implicit_deps = std::collections::BTreeMap::new();
        if let Some(paths) = self.implicit_deps.get(&target.name) {
            for path in paths {
                if let Some(tick) = mtime_ticks(path) {
                    implicit_deps.insert(path.clone(), tick);
                }
            }
        }

        let record = StateRecord {
            output_path: target.output.clone(),
            command_digest: compile_digest.unwrap_or(0),
            link_digest,
            last_built_at: mtime_ticks(&target.output).unwrap_or(0),
            toolchain_version: self.toolchain.version_string.clone(),
            source_stamps,
            implicit_deps,
            dependency_outputs,
        };

        let mut entries = vec![ArtifactEntry { path: target.output.clone(), kind: ArtifactKind::File }];
        entries.extend(target.extra_artifacts.iter().map(|p| ArtifactEntry { path: p.clone(), kind: ArtifactKind::File }));

        self.state.record_success(&target.name, record, entries);
        Ok(())
    }
}

/// Runs the dependency-scan shim over every target's sources, folding
/// target-matching imports into `graph` as edges and returning everything
/// else keyed by target name for dirty analysis to treat as implicit deps.
fn scan_implicit_deps(graph: &mut Graph, config: &BuildConfig) -> HashMap<String, Vec<PathBuf>> {
    let mut implicit_deps: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let node_ids: Vec<NodeId> = graph.node_ids().collect();

    for id in node_ids {
        let name = graph.name(id).to_string();
        let sources = graph.target(id).sources.clone();
        let working_dir = graph.target(id).working_dir.clone().unwrap_or_else(|| config.project_root.clone());
        let mut non_target_imports = Vec::new();

        for source in &sources {
            let scanned =
                depscan::scan(&config.toolchain, source, config.module_search_path.as_deref(), Some(&working_dir));
            for import in scanned.imports {
                let head = import.module.split('.').next().unwrap_or(&import.module).to_string();
                if head != name && graph.node_id(&head).is_some() {
                    let _ = graph.add_edge(&name, &head);
                } else {
                    non_target_imports.push(import.path);
                }
            }
        }

        if !non_target_imports.is_empty() {
            implicit_deps.insert(name, non_target_imports);
        }
    }

    implicit_deps
}
