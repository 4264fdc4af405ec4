//! Pipeline steps and their execution.

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::backup::{BackupSet, BackupVault, RestoreReport};
use crate::process::{CommandOutput, CommandSpec, Executor};

/// How far a step's side effect escapes the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Reach {
    /// Only local build products.
    Local,
    /// The local repository (commits, tags).
    Repository,
    /// Visible to others; cannot be undone by restoring files.
    Public,
}

/// The kinds of step a release runs, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Test,
    Build,
    Deploy,
    Stage,
    Commit,
    Tag,
    PushCommits,
    PushTags,
    Publish,
}

impl StepKind {
    /// Returns how far this step's effect escapes.
    #[must_use]
    pub fn reach(self) -> Reach {
        match self {
            Self::Test | Self::Build | Self::Stage => Reach::Local,
            Self::Commit | Self::Tag => Reach::Repository,
            Self::Deploy | Self::PushCommits | Self::PushTags | Self::Publish => Reach::Public,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Test => "test",
            Self::Build => "build",
            Self::Deploy => "deploy",
            Self::Stage => "stage",
            Self::Commit => "commit",
            Self::Tag => "tag",
            Self::PushCommits => "push",
            Self::PushTags => "push-tags",
            Self::Publish => "publish",
        };
        write!(f, "{name}")
    }
}

/// A named unit of work backed by an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    /// What the step does.
    pub kind: StepKind,
    /// Human-readable description, e.g. "Running tests".
    pub description: String,
    /// Command to run.
    pub command: CommandSpec,
    /// Whether failure aborts the release.
    pub required: bool,
}

impl PipelineStep {
    /// A step whose failure aborts the release.
    pub fn required(kind: StepKind, description: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            kind,
            description: description.into(),
            command,
            required: true,
        }
    }

    /// A step whose failure is only a warning.
    pub fn optional(kind: StepKind, description: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            required: false,
            ..Self::required(kind, description, command)
        }
    }

    /// Shorthand for `self.kind.reach()`.
    #[must_use]
    pub fn reach(&self) -> Reach {
        self.kind.reach()
    }
}

/// Outcome of a step that did not abort the release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// Exit status 0.
    Succeeded(CommandOutput),
    /// Optional step exited non-zero.
    Failed(CommandOutput),
    /// Optional step could not be launched.
    Unavailable(String),
}

/// A required step failed; local files were restored.
#[derive(Debug, Error)]
#[error("{description} failed: {detail}")]
pub struct StepFailure {
    /// Step that failed.
    pub step: StepKind,
    /// Step description.
    pub description: String,
    /// Command that was run.
    pub command: CommandSpec,
    /// Exit status or launch error.
    pub detail: String,
    /// Captured output, when the command ran.
    pub output: Option<CommandOutput>,
    /// Result of restoring the active backup, when one existed.
    pub restore: Option<RestoreReport>,
}

/// Runs pipeline steps, restoring backups when a required step fails.
pub struct StepRunner<'a> {
    executor: &'a dyn Executor,
    vault: &'a BackupVault,
    cwd: &'a Path,
}

impl<'a> StepRunner<'a> {
    /// Creates a runner executing commands in `cwd`.
    pub fn new(executor: &'a dyn Executor, vault: &'a BackupVault, cwd: &'a Path) -> Self {
        Self {
            executor,
            vault,
            cwd,
        }
    }

    /// Runs one step.
    ///
    /// # Errors
    ///
    /// Returns [`StepFailure`] when a required step exits non-zero or cannot
    /// be launched, after restoring `backup`.
    pub fn run(
        &self,
        step: &PipelineStep,
        backup: Option<&BackupSet>,
    ) -> Result<StepResult, StepFailure> {
        info!(step = %step.kind, command = %step.command, "{}", step.description);

        let (detail, output) = match self.executor.execute(&step.command, self.cwd) {
            Ok(output) if output.success() => return Ok(StepResult::Succeeded(output)),
            Ok(output) => (format!("exited with status {}", output.exit_code), Some(output)),
            Err(e) => (format!("could not launch {}: {e}", step.command.program), None),
        };

        if !step.required {
            warn!(step = %step.kind, %detail, "optional step did not succeed");
            return Ok(match output {
                Some(output) => StepResult::Failed(output),
                None => StepResult::Unavailable(detail),
            });
        }

        error!(step = %step.kind, %detail, "required step failed");
        if let Some(output) = &output {
            if !output.stdout.trim().is_empty() {
                error!(step = %step.kind, "stdout:\n{}", output.stdout.trim_end());
            }
            if !output.stderr.trim().is_empty() {
                error!(step = %step.kind, "stderr:\n{}", output.stderr.trim_end());
            }
        }

        let restore = backup.map(|set| self.vault.restore(set));

        Err(StepFailure {
            step: step.kind,
            description: step.description.clone(),
            command: step.command.clone(),
            detail,
            output,
            restore,
        })
    }
}
