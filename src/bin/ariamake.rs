//! `ariamake`: thin CLI front-end wiring `clap` subcommands to
//! [`ariamake::Build`].

#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use ariamake::config::{BuildConfig, ToolchainPaths};
use ariamake::report::Reporter;
use ariamake::{AriaError, Build, Manifest};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ariamake", about = "Incremental, parallel build automation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the build manifest (JSON), produced by a front-end outside
    /// this crate's scope.
    #[arg(long, global = true, default_value = "ariamake.json")]
    manifest: PathBuf,

    /// Project root all relative manifest paths are resolved against.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Where build state and the artifact registry are persisted.
    #[arg(long, global = true, default_value = ".ariamake")]
    state_dir: PathBuf,

    /// Compiler binary.
    #[arg(long, global = true, default_value = "aria-cc")]
    compiler: PathBuf,

    /// Archiver binary.
    #[arg(long, global = true, default_value = "aria-ar")]
    archiver: PathBuf,

    /// Maximum number of build tasks to run concurrently (defaults to the
    /// number of logical CPUs).
    #[arg(long, global = true)]
    jobs: Option<usize>,

    /// Stop submitting new work the moment any target fails; tasks already
    /// dispatched still run to completion.
    #[arg(long, global = true)]
    fail_fast: bool,

    /// Emit debug-level logging in addition to info.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build out-of-date targets.
    Build,
    /// Treat every target as dirty and build from scratch.
    Rebuild,
    /// Remove build artifacts.
    Clean {
        /// Remove only this target's artifacts (default: every target).
        target: Option<String>,
        /// Report what would be removed without touching the filesystem.
        #[arg(long)]
        dry_run: bool,
        /// Remove only artifacts of targets no longer present in the
        /// manifest, instead of everything.
        #[arg(long)]
        stale: bool,
    },
    /// Compute the dirty set and intended commands without running them.
    Check,
}

struct CliReporter {
    verbose: bool,
}

impl Reporter for CliReporter {
    fn on_target_start(&self, target: &str) {
        info!("building `{target}`");
    }

    fn on_target_done(&self, target: &str, skipped: bool) {
        if skipped {
            if self.verbose {
                info!("`{target}` up to date");
            }
        } else {
            info!("`{target}` done");
        }
    }

    fn on_phase(&self, phase: &str, current: usize, total: usize) {
        if self.verbose {
            debug!("{phase}: {current}/{total}");
        }
    }

    fn on_diagnostic(&self, tag: &str, target: Option<&str>, message: &str) {
        match target {
            Some(target) => warn!(tag, target, "{message}"),
            None => warn!(tag, "{message}"),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };
    tracing_subscriber::fmt().without_time().with_target(false).with_env_filter(filter).init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(tag = err.tag(), "{err}");
            exit_code_for(&err)
        }
    }
}

fn run(cli: Cli) -> ariamake::Result<ExitCode> {
    let manifest = load_manifest(&cli.manifest)?;

    let config = BuildConfig {
        project_root: cli.root.clone(),
        state_dir: cli.state_dir.clone(),
        jobs: cli.jobs.unwrap_or_else(num_cpus::get),
        fail_fast: cli.fail_fast,
        verbose: cli.verbose,
        toolchain: ToolchainPaths { compiler: cli.compiler.clone(), archiver: cli.archiver.clone() },
        module_search_path: std::env::var_os("ARIAMAKE_MODULE_PATH").map(PathBuf::from),
        ..BuildConfig::default()
    };

    let reporter: Arc<dyn Reporter> = Arc::new(CliReporter { verbose: cli.verbose });
    let build = Arc::new(Build::new(manifest, config)?);

    match cli.command {
        Commands::Build => {
            let plan = build.plan(false, reporter.as_ref())?;
            let outcome = build.run(&plan, Arc::clone(&reporter))?;
            Ok(exit_code_for_outcome(&outcome))
        }
        Commands::Rebuild => {
            let outcome = build.rebuild(Arc::clone(&reporter))?;
            Ok(exit_code_for_outcome(&outcome))
        }
        Commands::Check => {
            let plan = build.plan(false, reporter.as_ref())?;
            for target in &plan.dirty_targets {
                println!("{target}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clean { target, dry_run, stale } => {
            let report = if stale {
                build.clean_orphans(dry_run, reporter.as_ref())?
            } else {
                build.clean(target.as_deref(), dry_run, reporter.as_ref())?
            };
            for path in &report.removed {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_manifest(path: &std::path::Path) -> ariamake::Result<Manifest> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AriaError::manifest(format!("cannot read `{}`: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| AriaError::manifest(format!("cannot parse `{}`: {e}", path.display())))
}

fn exit_code_for_outcome(outcome: &ariamake::ScheduleOutcome) -> ExitCode {
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn exit_code_for(err: &AriaError) -> ExitCode {
    match err {
        AriaError::Manifest { .. } | AriaError::StateCorruption { .. } => ExitCode::from(2),
        AriaError::Cycle { .. } => ExitCode::from(3),
        AriaError::ToolchainMissing { .. } => ExitCode::from(4),
        AriaError::SubprocessFailure { .. }
        | AriaError::Timeout { .. }
        | AriaError::DirtyAnalysis { .. }
        | AriaError::Io { .. }
        | AriaError::Serde(_)
        | AriaError::Cancelled => ExitCode::from(1),
    }
}
