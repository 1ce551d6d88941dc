mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{ConfigMerger, PathOverrides};
use specsync_core::adapters::FsBackend;
use specsync_core::{
    Bump, ChangeSet, Pipeline, PipelineError, StatusReport, SyncOutcome, SyncResult, Version,
};
use specsync_render::{
    render_changes_md, render_matrix_md, render_migration_guide_md, render_plan_md,
    render_result_md,
};
use std::io::Write;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Exit code for "nothing changed" outcomes.
const EXIT_NO_CHANGES: u8 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "specsync",
    version,
    about = "Detect, version and sync API contract changes."
)]
struct Cli {
    /// Project root holding specsync.toml (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    project_root: Utf8PathBuf,

    /// Working-copy contracts directory (default: <project_root>/specifications).
    #[arg(long, global = true)]
    specs_dir: Option<Utf8PathBuf>,

    /// State directory for tracker, snapshots and backups (default: <project_root>/.specsync).
    #[arg(long, global = true)]
    state_dir: Option<Utf8PathBuf>,

    /// Generated artifacts directory (default: <project_root>/generated).
    #[arg(long, global = true)]
    artifacts_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report whether contracts changed since they were last versioned.
    Status(StatusArgs),
    /// Create, list and compare contract versions.
    #[command(subcommand)]
    Version(VersionCommand),
    /// Preview the sync plan for a contract (read-only).
    Plan(PlanArgs),
    /// Execute the sync plan for a contract.
    Sync(SyncArgs),
    /// Print the current snapshot of a contract.
    Snapshot(NameArgs),
    /// Stop tracking a contract. Snapshots and backups are kept.
    Untrack(NameArgs),
}

#[derive(Debug, Subcommand)]
enum VersionCommand {
    /// Snapshot the working copy as the next version.
    Create(CreateArgs),
    /// List recorded versions.
    List(ListArgs),
    /// Compatibility matrix across every versioned contract.
    Matrix(FormatArgs),
    /// Diff two recorded versions.
    Compare(CompareArgs),
    /// Migration guidance between two recorded versions.
    Migrate(CompareArgs),
}

#[derive(Debug, Parser)]
struct NameArgs {
    name: String,
}

#[derive(Debug, Parser)]
struct StatusArgs {
    /// Contract name (default: every discovered contract).
    name: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct CreateArgs {
    name: String,

    /// Override the bump derived from the change classification.
    #[arg(long, value_enum)]
    bump: Option<BumpArg>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct ListArgs {
    /// Contract name (default: every versioned contract).
    name: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct FormatArgs {
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct CompareArgs {
    name: String,
    from: Version,
    to: Version,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct PlanArgs {
    name: String,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also print a unified diff of the artifacts the plan would write.
    #[arg(long, default_value_t = false)]
    patch: bool,
}

#[derive(Debug, Parser)]
struct SyncArgs {
    name: String,

    /// Acknowledge breaking changes.
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Abort and roll back if the sync's I/O is still running after N ms.
    #[arg(long)]
    deadline_ms: Option<u64>,

    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Md,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BumpArg {
    Major,
    Minor,
    Patch,
}

impl From<BumpArg> for Bump {
    fn from(b: BumpArg) -> Self {
        match b {
            BumpArg::Major => Bump::Major,
            BumpArg::Minor => Bump::Minor,
            BumpArg::Patch => Bump::Patch,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match real_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn real_main(cli: Cli) -> Result<u8, PipelineError> {
    let file_config =
        config::load_or_default(&cli.project_root).context("load specsync.toml config")?;
    let merger = ConfigMerger::new(file_config);
    let overrides = PathOverrides {
        specs_dir: cli.specs_dir,
        state_dir: cli.state_dir,
        artifacts_dir: cli.artifacts_dir,
    };
    let settings = merger.settings(&cli.project_root, &overrides);
    debug!(?settings, "resolved settings");

    let backend = FsBackend::new(&settings);
    let pipeline = Pipeline::new(backend.ports());

    match cli.cmd {
        Command::Status(args) => cmd_status(&pipeline, args),
        Command::Version(cmd) => cmd_version(&pipeline, cmd),
        Command::Plan(args) => cmd_plan(&pipeline, args),
        Command::Sync(args) => {
            let merged = merger.merge_sync(args.force, args.deadline_ms);
            let pipeline = pipeline.with_deadline(merged.deadline);
            cmd_sync(&pipeline, &args.name, merged.force, args.format)
        }
        Command::Snapshot(args) => {
            let doc = pipeline.current_snapshot(&args.name)?;
            let bytes = specsync_contract::serialize(&doc)?;
            write_stdout(&String::from_utf8_lossy(&bytes))?;
            Ok(0)
        }
        Command::Untrack(args) => {
            pipeline.untrack(&args.name)?;
            info!(name = %args.name, "untracked");
            Ok(0)
        }
    }
}

fn cmd_status(pipeline: &Pipeline<'_>, args: StatusArgs) -> Result<u8, PipelineError> {
    let reports = match &args.name {
        Some(name) => vec![pipeline.status(name)?],
        None => pipeline.status_all()?,
    };
    let any_changed = reports.iter().any(|r| r.changed);

    match (args.format, &args.name) {
        (OutputFormat::Json, Some(_)) => write_json(&reports[0])?,
        (OutputFormat::Json, None) => write_json(&reports)?,
        (OutputFormat::Md, _) => {
            for r in &reports {
                if let Some(changes) = &r.changes {
                    write_stdout(&render_changes_md(changes))?;
                } else {
                    write_stdout(&format!("{}\n", status_line(r)))?;
                }
            }
        }
        (OutputFormat::Text, _) => {
            for r in &reports {
                write_stdout(&format!("{}\n", status_line(r)))?;
            }
        }
    }

    Ok(if any_changed { 0 } else { EXIT_NO_CHANGES })
}

fn status_line(r: &StatusReport) -> String {
    let mut line = format!("{}: ", r.name);
    if !r.changed {
        line.push_str("unchanged");
    } else if let Some(c) = r.classification {
        line.push_str(&format!("changed ({c})"));
    } else {
        line.push_str("changed (unversioned)");
    }
    let mut facts = Vec::new();
    if let Some(s) = r.sync_status {
        facts.push(s.to_string());
    } else {
        facts.push("untracked".to_string());
    }
    if let Some(v) = r.synced_version {
        facts.push(format!("synced v{v}"));
    }
    if let Some(v) = r.latest_version {
        facts.push(format!("latest v{v}"));
    }
    line.push_str(&format!(" [{}]", facts.join(", ")));
    line
}

fn cmd_version(pipeline: &Pipeline<'_>, cmd: VersionCommand) -> Result<u8, PipelineError> {
    match cmd {
        VersionCommand::Create(args) => {
            let record = pipeline.create_version(&args.name, args.bump.map(Bump::from))?;
            match args.format {
                OutputFormat::Json => write_json(&record)?,
                _ => write_stdout(&format!(
                    "created {} v{} ({})\n",
                    record.name,
                    record.version,
                    record
                        .classification
                        .map_or("initial", |c| c.as_str())
                ))?,
            }
            Ok(0)
        }
        VersionCommand::List(args) => {
            let records = match &args.name {
                Some(name) => pipeline.list_versions(name)?,
                None => pipeline.list_all_versions()?,
            };
            match args.format {
                OutputFormat::Json => write_json(&records)?,
                _ => {
                    for r in &records {
                        write_stdout(&format!(
                            "{} v{} {} {}\n",
                            r.name,
                            r.version,
                            r.created_at.to_rfc3339(),
                            r.fingerprint.get(..12).unwrap_or(&r.fingerprint)
                        ))?;
                    }
                }
            }
            Ok(0)
        }
        VersionCommand::Matrix(args) => {
            let rows = pipeline.compatibility_matrix()?;
            match args.format {
                OutputFormat::Json => write_json(&rows)?,
                _ => write_stdout(&render_matrix_md(&rows))?,
            }
            Ok(0)
        }
        VersionCommand::Compare(args) => {
            let changes = pipeline.compare_versions(&args.name, &args.from, &args.to)?;
            write_changes(&changes, args.format)?;
            Ok(if changes.is_empty() { EXIT_NO_CHANGES } else { 0 })
        }
        VersionCommand::Migrate(args) => {
            let plan = pipeline.migration_plan(&args.name, &args.from, &args.to)?;
            match args.format {
                OutputFormat::Json => write_json(&plan)?,
                _ => write_stdout(&render_migration_guide_md(&plan))?,
            }
            Ok(0)
        }
    }
}

fn write_changes(changes: &ChangeSet, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(changes),
        OutputFormat::Md => write_stdout(&render_changes_md(changes)),
        OutputFormat::Text => {
            let mut out = format!("{}: {}\n", changes.name, changes.summary());
            for c in changes.iter() {
                out.push_str(&format!("  {:<13} {} ({})\n", c.classification.as_str(), c.path, c.message));
            }
            write_stdout(&out)
        }
    }
}

fn cmd_plan(pipeline: &Pipeline<'_>, args: PlanArgs) -> Result<u8, PipelineError> {
    let outcome = pipeline.plan_sync(&args.name)?;
    let plan = &outcome.plan;
    match args.format {
        OutputFormat::Json => write_json(plan)?,
        OutputFormat::Md => write_stdout(&render_plan_md(plan))?,
        OutputFormat::Text => {
            let mut out = format!(
                "{}: {} -> v{} ({})\n",
                plan.name,
                plan.from_version
                    .map_or_else(|| "(none)".to_string(), |v| format!("v{v}")),
                plan.target_version,
                outcome.changes.summary()
            );
            if plan.is_noop() {
                out.push_str("  nothing to do\n");
            }
            for (i, a) in plan.actions.iter().enumerate() {
                out.push_str(&format!("  {}. {} {}\n", i + 1, a.kind.as_str(), a.target.id));
            }
            if plan.requires_acknowledgement {
                out.push_str("  breaking changes: sync requires --force\n");
            }
            write_stdout(&out)?;
        }
    }
    if args.patch && !outcome.patch.is_empty() {
        write_stdout(&outcome.patch)?;
    }
    Ok(if plan.is_noop() { EXIT_NO_CHANGES } else { 0 })
}

fn cmd_sync(
    pipeline: &Pipeline<'_>,
    name: &str,
    force: bool,
    format: OutputFormat,
) -> Result<u8, PipelineError> {
    let result = pipeline.execute_sync(name, force)?;
    write_result(&result, format)?;
    Ok(match result.status {
        SyncOutcome::NoOp => EXIT_NO_CHANGES,
        _ => 0,
    })
}

fn write_result(result: &SyncResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(result),
        OutputFormat::Md => write_stdout(&render_result_md(result)),
        OutputFormat::Text => {
            let line = match result.status {
                SyncOutcome::NoOp => format!("{}: already in sync at v{}\n", result.name, result.version),
                SyncOutcome::Applied => format!(
                    "{}: synced to v{} ({} actions{})\n",
                    result.name,
                    result.version,
                    result.actions.len(),
                    if result.forced { ", forced" } else { "" }
                ),
                SyncOutcome::RolledBack => format!("{}: rolled back\n", result.name),
            };
            write_stdout(&line)
        }
    }
}

fn write_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let mut s = serde_json::to_string_pretty(value).context("serialize json")?;
    s.push('\n');
    write_stdout(&s)
}

fn write_stdout(s: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(s.as_bytes()).context("write stdout")?;
    stdout.flush().context("flush stdout")
}
