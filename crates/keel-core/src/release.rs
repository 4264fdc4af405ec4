//! Release orchestration.
//!
//! A release walks a fixed sequence of states. Local files are snapshotted
//! before they are rewritten, and any failure restores them. Once a step with
//! public reach (deploy, push, publish) has succeeded, the release has crossed
//! its irreversible boundary: failures are still rolled back locally, but the
//! operator is told which effects are already live.

use std::fmt;
use std::fs;
use std::mem;
use std::path::PathBuf;

use chrono::NaiveDate;
use keel_config::Config;
use semver::Version;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backup::{BackupSet, BackupVault, RestoreReport};
use crate::changelog::ChangelogLedger;
use crate::diff::DiffLine;
use crate::files::{ApplyReport, ArtifactMutator, ArtifactPreview, read_version_source};
use crate::host::{HostStatus, ReleaseHost};
use crate::interact::{CancelFlag, Confirm};
use crate::pipeline::{PipelineStep, Reach, StepKind, StepResult, StepRunner};
use crate::process::{CommandSpec, Executor};
use crate::version::{BumpKind, VersionManager};
use crate::{CoreError, CoreResult};

/// Which optional parts of the pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseOptions {
    /// Component to bump.
    pub bump: BumpKind,
    /// Run the test command.
    pub run_tests: bool,
    /// Run the deploy command (after confirmation).
    pub deploy: bool,
    /// Push commits and tags.
    pub push: bool,
    /// Create a hosted release.
    pub publish: bool,
    /// Date written into the changelog heading.
    pub date: NaiveDate,
}

impl ReleaseOptions {
    /// Everything enabled.
    #[must_use]
    pub fn new(bump: BumpKind, date: NaiveDate) -> Self {
        Self {
            bump,
            run_tests: true,
            deploy: true,
            push: true,
            publish: true,
            date,
        }
    }
}

/// Progress of a release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReleaseState {
    Init,
    VersionComputed,
    ChangelogValidated,
    BackedUp,
    FilesMutated,
    Tested,
    Built,
    Deployed,
    Committed,
    Tagged,
    Pushed,
    Published,
    Done,
}

impl ReleaseState {
    /// State reached when a step of `kind` succeeds.
    fn after(kind: StepKind) -> Option<Self> {
        match kind {
            StepKind::Test => Some(Self::Tested),
            StepKind::Build => Some(Self::Built),
            StepKind::Deploy => Some(Self::Deployed),
            StepKind::Commit => Some(Self::Committed),
            StepKind::Tag => Some(Self::Tagged),
            StepKind::PushTags => Some(Self::Pushed),
            StepKind::Publish => Some(Self::Published),
            StepKind::Stage | StepKind::PushCommits => None,
        }
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::VersionComputed => "version computed",
            Self::ChangelogValidated => "changelog validated",
            Self::BackedUp => "backed up",
            Self::FilesMutated => "files mutated",
            Self::Tested => "tested",
            Self::Built => "built",
            Self::Deployed => "deployed",
            Self::Committed => "committed",
            Self::Tagged => "tagged",
            Self::Pushed => "pushed",
            Self::Published => "published",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// Everything a release will do, computed without touching anything.
#[derive(Debug, Clone)]
pub struct ReleasePlan {
    /// Version read from the version source.
    pub current: Version,
    /// Version being released.
    pub next: Version,
    /// Tag to create.
    pub tag: String,
    /// Content length of the pending changelog section.
    pub pending_chars: usize,
    /// Required content length.
    pub min_pending_chars: usize,
    /// Steps in execution order.
    pub steps: Vec<PipelineStep>,
    /// Files backed up and rewritten.
    pub touched: Vec<PathBuf>,
    /// Problems noticed while planning.
    pub warnings: Vec<String>,
}

impl ReleasePlan {
    /// Returns whether the pending changelog section is long enough.
    #[must_use]
    pub fn changelog_ready(&self) -> bool {
        self.pending_chars >= self.min_pending_chars
    }
}

/// File changes a release would make.
#[derive(Debug, Clone)]
pub struct ReleasePreview {
    /// Per-artifact line changes.
    pub artifacts: Vec<ArtifactPreview>,
    /// Changelog line changes.
    pub changelog: Vec<DiffLine>,
}

/// Mutable state threaded through every transition of one run.
#[derive(Debug)]
pub struct ReleaseContext {
    /// Last state reached.
    pub state: ReleaseState,
    /// Active snapshot, from capture until discard or restore.
    pub backup: Option<BackupSet>,
    /// Steps that succeeded.
    pub completed: Vec<StepKind>,
    /// Steps skipped or degraded, with the reason.
    pub skipped: Vec<(StepKind, String)>,
    /// Public effects that cannot be undone.
    pub live: Vec<String>,
    /// Repository effects (commit, tag) that restoring files does not undo.
    pub local_effects: Vec<String>,
    /// Warnings for the operator.
    pub warnings: Vec<String>,
}

impl ReleaseContext {
    fn new() -> Self {
        Self {
            state: ReleaseState::Init,
            backup: None,
            completed: Vec::new(),
            skipped: Vec::new(),
            live: Vec::new(),
            local_effects: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self, state: ReleaseState) {
        debug!(from = %self.state, to = %state, "release state");
        self.state = state;
    }

    fn skip(&mut self, kind: StepKind, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(step = %kind, %reason, "step skipped");
        self.warnings.push(format!("{kind} skipped: {reason}"));
        self.skipped.push((kind, reason));
    }

    /// Returns whether a public step has succeeded.
    #[must_use]
    pub fn boundary_crossed(&self) -> bool {
        !self.live.is_empty()
    }
}

/// Summary of a successful release.
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    /// Previous version.
    pub previous: Version,
    /// Released version.
    pub version: Version,
    /// Created tag.
    pub tag: String,
    /// Per-artifact results.
    pub artifacts: ApplyReport,
    /// Steps that succeeded.
    pub completed: Vec<StepKind>,
    /// Steps skipped or degraded, with the reason.
    pub skipped: Vec<(StepKind, String)>,
    /// Public effects.
    pub live: Vec<String>,
    /// Warnings for the operator.
    pub warnings: Vec<String>,
}

/// How a release run ended without failing.
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// Every required step succeeded.
    Released(ReleaseReport),
    /// The operator declined to continue; nothing was touched.
    Aborted,
}

/// A release that did not complete.
#[derive(Debug, Error)]
#[error("release stopped after reaching state '{state}'")]
pub struct ReleaseFailure {
    /// Cause.
    #[source]
    pub error: CoreError,
    /// Last state reached.
    pub state: ReleaseState,
    /// Whether local files were restored from backup.
    pub rolled_back: bool,
    /// Result of the restore, when one ran.
    pub restore: Option<RestoreReport>,
    /// Public effects that are live and cannot be undone.
    pub live: Vec<String>,
    /// Repository effects that were not undone.
    pub local_effects: Vec<String>,
    /// Backup directory left on disk for inspection.
    pub backup_dir: Option<PathBuf>,
}

impl ReleaseFailure {
    /// Returns whether the failure happened after the irreversible boundary.
    #[must_use]
    pub fn is_irreversible(&self) -> bool {
        !self.live.is_empty()
    }
}

/// Composes version, changelog, artifacts, backups and steps into a release.
pub struct ReleaseOrchestrator<'a> {
    root: PathBuf,
    config: &'a Config,
    options: ReleaseOptions,
    executor: &'a dyn Executor,
    confirm: &'a dyn Confirm,
    cancel: CancelFlag,
    vault: BackupVault,
    mutator: ArtifactMutator,
}

impl<'a> ReleaseOrchestrator<'a> {
    /// Creates an orchestrator for the project at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        config: &'a Config,
        options: ReleaseOptions,
        executor: &'a dyn Executor,
        confirm: &'a dyn Confirm,
    ) -> Self {
        let root = root.into();
        let vault = BackupVault::new(root.join(&config.backup.dir));
        let mutator = ArtifactMutator::new(&root, &config.artifacts);
        Self {
            root,
            config,
            options,
            executor,
            confirm,
            cancel: CancelFlag::new(),
            vault,
            mutator,
        }
    }

    /// Polls `cancel` between steps.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn changelog_path(&self) -> PathBuf {
        self.root.join(&self.config.changelog.path)
    }

    fn load_changelog(&self) -> CoreResult<ChangelogLedger> {
        ChangelogLedger::load(&self.changelog_path(), &self.config.version.tag_prefix)
    }

    /// Computes the next version and the full step list.
    ///
    /// # Errors
    ///
    /// Returns an error if the version source or changelog cannot be read.
    pub fn prepare(&self) -> CoreResult<ReleasePlan> {
        let current = read_version_source(&self.root, &self.config.version)?;
        let next = VersionManager::new().bump(&current, self.options.bump)?;
        let tag = self.config.tag_name(&next.to_string());
        info!(current = %current, next = %next, bump = %self.options.bump, "computed version");

        let ledger = self.load_changelog()?;
        let pending_chars = ledger.pending_content_len().unwrap_or(0);

        let mut warnings = Vec::new();
        if !self
            .config
            .artifacts
            .iter()
            .any(|a| a.path == self.config.version.source)
        {
            warnings.push(format!(
                "version source {} is not among the declared artifacts and will not be updated",
                self.config.version.source
            ));
        }

        let mut touched = self.mutator.paths();
        let changelog = self.changelog_path();
        if !touched.contains(&changelog) {
            touched.push(changelog);
        }
        let stage_paths: Vec<String> = touched
            .iter()
            .filter(|path| path.exists())
            .filter_map(|path| path.strip_prefix(&self.root).ok())
            .map(|path| path.display().to_string())
            .collect();

        let steps = self.plan_steps(&next, &tag, &stage_paths, &mut warnings);

        Ok(ReleasePlan {
            current,
            next,
            tag,
            pending_chars,
            min_pending_chars: self.config.changelog.min_pending_chars,
            steps,
            touched,
            warnings,
        })
    }

    fn plan_steps(
        &self,
        next: &Version,
        tag: &str,
        stage_paths: &[String],
        warnings: &mut Vec<String>,
    ) -> Vec<PipelineStep> {
        let commands = &self.config.commands;
        let git = &self.config.git;
        let version = next.to_string();
        let mut steps = Vec::new();

        let mut configured = |kind: StepKind, argv: &[String], description: &str| {
            match CommandSpec::from_argv(argv) {
                Some(command) => steps.push(PipelineStep::required(kind, description, command)),
                None => warnings.push(format!("no {kind} command configured")),
            }
        };

        if self.options.run_tests {
            configured(StepKind::Test, &commands.test, "Running tests");
        }
        configured(StepKind::Build, &commands.build, "Building package");
        if self.options.deploy {
            configured(StepKind::Deploy, &commands.deploy, "Deploying package");
        }

        let git_cmd = || CommandSpec::new(&git.program);
        steps.push(PipelineStep::required(
            StepKind::Stage,
            "Staging files",
            git_cmd().arg("add").args(stage_paths),
        ));
        steps.push(PipelineStep::required(
            StepKind::Commit,
            "Committing changes",
            git_cmd()
                .args(["commit", "-m"])
                .arg(git.commit_message.replace("{version}", &version)),
        ));
        steps.push(PipelineStep::required(
            StepKind::Tag,
            format!("Creating tag {tag}"),
            git_cmd()
                .args(["tag", "-a", tag, "-m"])
                .arg(git.tag_message.replace("{version}", &version)),
        ));

        if self.options.push {
            steps.push(PipelineStep::required(
                StepKind::PushCommits,
                "Pushing commits",
                git_cmd().arg("push"),
            ));
            steps.push(PipelineStep::required(
                StepKind::PushTags,
                "Pushing tags",
                git_cmd().args(["push", "--tags"]),
            ));
        }

        if self.options.publish {
            let host = ReleaseHost::new(&self.config.release_host, &self.root);
            let (command, _) = host.create_command(tag, next);
            steps.push(PipelineStep::optional(
                StepKind::Publish,
                format!("Creating release {tag}"),
                command,
            ));
        }

        steps
    }

    /// Computes the file changes `execute` would make.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or the changelog cannot be promoted.
    pub fn preview(&self, plan: &ReleasePlan) -> CoreResult<ReleasePreview> {
        let artifacts = self.mutator.preview(&plan.current, &plan.next)?;
        let changelog = self
            .load_changelog()?
            .preview_promotion(&plan.next, self.options.date)?;
        Ok(ReleasePreview {
            artifacts,
            changelog,
        })
    }

    /// Runs the plan.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseFailure`] when validation fails, a file cannot be
    /// rewritten, a required step fails, or the run is interrupted.
    pub fn execute(&self, plan: &ReleasePlan) -> Result<ReleaseOutcome, ReleaseFailure> {
        let mut ctx = ReleaseContext::new();
        ctx.advance(ReleaseState::VersionComputed);
        ctx.warnings.extend(plan.warnings.iter().cloned());

        self.load_changelog()
            .and_then(|ledger| ledger.check_pending(self.config.changelog.min_pending_chars))
            .map_err(|e| self.abort(&mut ctx, e, None))?;
        ctx.advance(ReleaseState::ChangelogValidated);

        let prompt = format!(
            "Release {} -> {} ({}). Continue?",
            plan.current, plan.next, plan.tag
        );
        if !self.confirm.confirm(&prompt) {
            info!("release aborted by operator");
            return Ok(ReleaseOutcome::Aborted);
        }
        self.check_cancel(&mut ctx)?;

        let set = self
            .vault
            .capture(&plan.touched)
            .map_err(|e| self.abort(&mut ctx, e, None))?;
        ctx.backup = Some(set);
        ctx.advance(ReleaseState::BackedUp);

        let artifacts = self
            .mutate(plan, &mut ctx)
            .map_err(|e| self.abort(&mut ctx, e, None))?;
        ctx.advance(ReleaseState::FilesMutated);

        let runner = StepRunner::new(self.executor, &self.vault, &self.root);
        for step in &plan.steps {
            self.check_cancel(&mut ctx)?;

            let result = match step.kind {
                StepKind::Deploy => {
                    if !self.confirm.confirm(&format!("Deploy {}?", plan.next)) {
                        ctx.skip(StepKind::Deploy, "declined by operator");
                        continue;
                    }
                    runner.run(step, ctx.backup.as_ref())
                }
                StepKind::Publish => Ok(self.publish(plan, &runner, &mut ctx)),
                _ => runner.run(step, ctx.backup.as_ref()),
            };

            match result {
                Ok(StepResult::Succeeded(_)) => {
                    self.record_success(step, plan, &mut ctx);
                }
                Ok(StepResult::Failed(output)) => {
                    ctx.skip(step.kind, format!("exited with status {}", output.exit_code));
                }
                Ok(StepResult::Unavailable(reason)) => ctx.skip(step.kind, reason),
                Err(failure) => {
                    let restore = failure.restore.clone();
                    return Err(self.abort(&mut ctx, CoreError::Step(Box::new(failure)), restore));
                }
            }
        }

        if let Some(set) = ctx.backup.take() {
            if let Err(e) = self.vault.discard(set) {
                warn!(error = %e, "could not remove backup directory");
                ctx.warnings
                    .push(format!("could not remove {}: {e}", self.vault.dir().display()));
            }
        }
        ctx.advance(ReleaseState::Done);
        info!(version = %plan.next, tag = %plan.tag, "release complete");

        Ok(ReleaseOutcome::Released(ReleaseReport {
            previous: plan.current.clone(),
            version: plan.next.clone(),
            tag: plan.tag.clone(),
            artifacts,
            completed: ctx.completed,
            skipped: ctx.skipped,
            live: ctx.live,
            warnings: ctx.warnings,
        }))
    }

    fn mutate(&self, plan: &ReleasePlan, ctx: &mut ReleaseContext) -> CoreResult<ApplyReport> {
        let report = self.mutator.apply_version(&plan.current, &plan.next)?;

        let issues = report.issues();
        if !issues.is_empty() {
            return Err(CoreError::ArtifactsNotUpdated(issues));
        }
        for warning in report.warnings() {
            ctx.warnings.push(format!("optional artifact not updated: {warning}"));
        }

        // artifacts may point at the changelog itself
        let promoted = self
            .load_changelog()?
            .promote_pending(&plan.next, self.options.date)?;
        fs::write(self.changelog_path(), promoted)?;
        info!(path = %self.config.changelog.path, version = %plan.next, "updated changelog");

        Ok(report)
    }

    fn publish(
        &self,
        plan: &ReleasePlan,
        runner: &StepRunner<'_>,
        ctx: &mut ReleaseContext,
    ) -> StepResult {
        let host = ReleaseHost::new(&self.config.release_host, &self.root);
        match host.status(self.executor) {
            HostStatus::Ready => {}
            HostStatus::Missing(reason) | HostStatus::Unauthenticated(reason) => {
                return StepResult::Unavailable(reason);
            }
        }

        let entry = self
            .load_changelog()
            .ok()
            .and_then(|ledger| ledger.extract_entry(&plan.next));
        let notes = host.compose_notes(&plan.next, entry.as_deref(), &self.config.changelog.path);

        let notes_path = host.notes_path();
        if let Err(e) = fs::write(&notes_path, notes) {
            return StepResult::Unavailable(format!("could not write release notes: {e}"));
        }

        let (command, warning) = host.create_command(&plan.tag, &plan.next);
        if let Some(warning) = warning {
            warn!(%warning, "release asset");
            ctx.warnings.push(warning);
        }
        let step = PipelineStep::optional(
            StepKind::Publish,
            format!("Creating release {}", plan.tag),
            command,
        );
        let result = runner
            .run(&step, ctx.backup.as_ref())
            .unwrap_or_else(|failure| StepResult::Unavailable(failure.to_string()));

        if let Err(e) = fs::remove_file(&notes_path) {
            warn!(path = %notes_path.display(), error = %e, "could not remove release notes");
        }

        result
    }

    fn record_success(&self, step: &PipelineStep, plan: &ReleasePlan, ctx: &mut ReleaseContext) {
        ctx.completed.push(step.kind);

        let effect = match step.kind {
            StepKind::Deploy => format!("package {} deployed", plan.next),
            StepKind::PushCommits => "release commit pushed".to_string(),
            StepKind::PushTags => format!("tag {} pushed", plan.tag),
            StepKind::Publish => format!("hosted release {} published", plan.tag),
            StepKind::Commit => format!(
                "commit \"{}\"",
                self.config
                    .git
                    .commit_message
                    .replace("{version}", &plan.next.to_string())
            ),
            StepKind::Tag => format!("tag {}", plan.tag),
            StepKind::Test | StepKind::Build | StepKind::Stage => String::new(),
        };

        match step.reach() {
            Reach::Public => {
                if !ctx.boundary_crossed() {
                    info!(step = %step.kind, "irreversible boundary crossed");
                }
                ctx.live.push(effect);
            }
            Reach::Repository => ctx.local_effects.push(effect),
            Reach::Local => {}
        }

        if let Some(state) = ReleaseState::after(step.kind) {
            ctx.advance(state);
        }
    }

    fn check_cancel(&self, ctx: &mut ReleaseContext) -> Result<(), ReleaseFailure> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }

        if !ctx.boundary_crossed() {
            warn!(state = %ctx.state, "interrupted, rolling back");
            return Err(self.abort(ctx, CoreError::Interrupted, None));
        }

        warn!(state = %ctx.state, "interrupted after irreversible boundary, stopping");
        Err(ReleaseFailure {
            error: CoreError::Interrupted,
            state: ctx.state,
            rolled_back: false,
            restore: None,
            live: mem::take(&mut ctx.live),
            local_effects: mem::take(&mut ctx.local_effects),
            backup_dir: ctx.backup.take().map(|set| set.dir().to_path_buf()),
        })
    }

    /// Restores the active backup (unless `restore` already holds the result)
    /// and builds the failure report. A fully restored backup is discarded.
    fn abort(
        &self,
        ctx: &mut ReleaseContext,
        error: CoreError,
        restore: Option<RestoreReport>,
    ) -> ReleaseFailure {
        warn!(state = %ctx.state, error = %error, "release failed");

        let backup = ctx.backup.take();
        let restore = restore.or_else(|| backup.as_ref().map(|set| self.vault.restore(set)));

        let mut backup_dir = None;
        if let Some(set) = backup {
            let dir = set.dir().to_path_buf();
            if restore.as_ref().is_some_and(RestoreReport::is_complete) {
                if let Err(e) = self.vault.discard(set) {
                    warn!(dir = %dir.display(), error = %e, "could not remove backup directory");
                    backup_dir = Some(dir);
                }
            } else {
                backup_dir = Some(dir);
            }
        }

        ReleaseFailure {
            error,
            state: ctx.state,
            rolled_back: restore.is_some(),
            restore,
            live: mem::take(&mut ctx.live),
            local_effects: mem::take(&mut ctx.local_effects),
            backup_dir,
        }
    }
}
