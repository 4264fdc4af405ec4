//! Release command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Args;
use keel_core::{
    ArtifactPreview, AssumeYes, BumpKind, CancelFlag, Confirm, CoreError, ReleaseFailure,
    ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome, ReleasePlan, ReleasePreview,
    ReleaseReport, ReleaseState, SystemExecutor,
};
use keel_git::Repository;
use tracing::{debug, info, warn};

use super::{BumpTypeArg, load_project};
use crate::prompt::TerminalPrompt;
use crate::signal;

/// Arguments for the release command.
#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Bump type (major, minor, patch) [default: minor]
    #[arg(short = 't', long, value_enum, conflicts_with_all = ["major", "minor", "patch"])]
    pub bump_type: Option<BumpTypeArg>,

    /// Shorthand for --bump-type major
    #[arg(long, conflicts_with_all = ["minor", "patch"])]
    pub major: bool,

    /// Shorthand for --bump-type minor
    #[arg(long, conflicts_with = "patch")]
    pub minor: bool,

    /// Shorthand for --bump-type patch
    #[arg(long)]
    pub patch: bool,

    /// Skip the deploy step
    #[arg(long)]
    pub no_deploy: bool,

    /// Skip creating the hosted release
    #[arg(long)]
    pub no_release: bool,

    /// Skip pushing commits and tags
    #[arg(long)]
    pub no_push: bool,

    /// Skip the test step
    #[arg(long)]
    pub skip_tests: bool,

    /// Print the planned changes and steps without touching anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl ReleaseArgs {
    fn bump_kind(&self) -> BumpKind {
        if let Some(kind) = self.bump_type {
            kind.into()
        } else if self.major {
            BumpKind::Major
        } else if self.patch {
            BumpKind::Patch
        } else {
            BumpKind::Minor
        }
    }

    fn options(&self) -> ReleaseOptions {
        ReleaseOptions {
            run_tests: !self.skip_tests,
            deploy: !self.no_deploy,
            push: !self.no_push,
            publish: !self.no_release,
            ..ReleaseOptions::new(self.bump_kind(), Local::now().date_naive())
        }
    }
}

/// Runs the release command.
pub fn run(args: &ReleaseArgs, dir: &Path) -> Result<()> {
    let (root, config) = load_project(dir)?;
    info!(root = %root.display(), "loaded configuration");

    let confirm: &dyn Confirm = if args.yes { &AssumeYes } else { &TerminalPrompt };
    let cancel = CancelFlag::new();
    let orchestrator =
        ReleaseOrchestrator::new(&root, &config, args.options(), &SystemExecutor, confirm)
            .with_cancel(cancel.clone());

    let plan = orchestrator.prepare().context("failed to prepare release")?;
    preflight(&root, &plan)?;
    print_plan(&plan);

    if args.dry_run {
        let preview = orchestrator
            .preview(&plan)
            .context("failed to compute planned changes")?;
        print_preview(&preview, &config.changelog.path);
        println!("\nDry run: no files were changed and no commands were run.");
        return Ok(());
    }

    signal::install(cancel);

    match orchestrator.execute(&plan) {
        Ok(ReleaseOutcome::Released(report)) => {
            print_report(&report, args.no_push);
            Ok(())
        }
        Ok(ReleaseOutcome::Aborted) => {
            println!("Release aborted; nothing was changed.");
            Ok(())
        }
        Err(failure) => {
            print_failure(&failure);
            Err(failure).context(format!("release {} failed", plan.next))
        }
    }
}

/// Repository checks that must hold before anything is touched.
fn preflight(root: &Path, plan: &ReleasePlan) -> Result<()> {
    let repo = match Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) => {
            warn!(error = %e, "not inside a git repository; git steps will fail");
            return Ok(());
        }
    };
    debug!(repo = %repo.path().display(), "running preflight checks");

    if repo
        .tag_exists(&plan.tag)
        .context("failed to read repository tags")?
    {
        bail!("tag {} already exists", plan.tag);
    }

    let dirty = repo
        .dirty_paths()
        .context("failed to read repository status")?;
    if !dirty.is_empty() {
        warn!(
            files = dirty.len(),
            "working tree has uncommitted changes; only release files are committed"
        );
    }

    Ok(())
}

fn print_plan(plan: &ReleasePlan) {
    println!(
        "Release {} -> {} (tag {})\n",
        plan.current, plan.next, plan.tag
    );

    if plan.changelog_ready() {
        println!(
            "Changelog: ready ({} characters pending)",
            plan.pending_chars
        );
    } else {
        println!(
            "Changelog: NOT READY ({} of {} characters pending)",
            plan.pending_chars, plan.min_pending_chars
        );
    }

    println!("\nSteps:");
    for (index, step) in plan.steps.iter().enumerate() {
        let optional = if step.required { "" } else { " (optional)" };
        println!(
            "  {}. {}{optional}: {}",
            index + 1,
            step.description,
            step.command
        );
    }

    if !plan.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &plan.warnings {
            println!("  - {warning}");
        }
    }
    println!();
}

fn print_preview(preview: &ReleasePreview, changelog_path: &str) {
    println!("Planned file changes:");
    for ArtifactPreview { path, changes } in &preview.artifacts {
        match changes {
            Ok(lines) if lines.is_empty() => println!("\n  {path}: unchanged"),
            Ok(lines) => {
                println!("\n  {path}:");
                for line in lines {
                    println!("    {line}");
                }
            }
            Err(problem) => println!("\n  {path}: {problem}"),
        }
    }

    println!("\n  {changelog_path}:");
    for line in &preview.changelog {
        println!("    {line}");
    }
}

fn print_report(report: &ReleaseReport, pushed_disabled: bool) {
    println!(
        "\nReleased {} -> {} ({}).",
        report.previous, report.version, report.tag
    );
    println!(
        "  {} artifact(s) updated, {} step(s) completed",
        report.artifacts.applied_count(),
        report.completed.len()
    );

    // skipped steps are included in the warnings
    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }

    if pushed_disabled {
        println!("\nNext steps:");
        println!("  git push && git push --tags");
    }
}

fn print_failure(failure: &ReleaseFailure) {
    eprintln!("\nRelease failed: {}", failure.error);

    if let CoreError::Step(step) = &failure.error {
        eprintln!("  command: {}", step.command);
        if let Some(output) = &step.output {
            for (name, text) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
                if !text.trim().is_empty() {
                    eprintln!("  {name}:");
                    for line in text.lines() {
                        eprintln!("    {line}");
                    }
                }
            }
        }
    }

    if let Some(restore) = &failure.restore {
        if restore.is_complete() {
            eprintln!(
                "\nLocal files were restored ({} file(s)).",
                restore.restored.len()
            );
        } else {
            eprintln!("\nSome files could not be restored:");
            for (path, reason) in &restore.failed {
                eprintln!("  - {}: {reason}", path.display());
            }
        }
    } else if !failure.rolled_back && failure.state >= ReleaseState::FilesMutated {
        eprintln!("\nLocal files were NOT restored.");
    }

    if failure.is_irreversible() {
        eprintln!("\nThese effects are already live and cannot be rolled back automatically:");
        for effect in &failure.live {
            eprintln!("  - {effect}");
        }
    }

    if !failure.local_effects.is_empty() {
        eprintln!("\nLocal repository changes that were not undone:");
        for effect in &failure.local_effects {
            eprintln!("  - {effect}");
        }
    }

    if let Some(dir) = &failure.backup_dir {
        eprintln!(
            "\nBackups kept in {}; remove it after inspecting the working tree.",
            dir.display()
        );
    }
}
