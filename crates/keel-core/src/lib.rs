//! Core library for Keel.
//!
//! This crate provides the release pipeline: version parsing and bumping,
//! changelog promotion, artifact rewriting, backups, external steps and the
//! orchestrator that ties them together.

mod backup;
mod changelog;
mod diff;
mod error;
mod files;
mod host;
mod interact;
mod pipeline;
mod process;
mod release;
mod version;

pub use backup::{BackupSet, BackupVault, MANIFEST_FILE, RestoreReport, Snapshot};
pub use changelog::{ChangelogLedger, PENDING_LABEL, TEMPLATE_SUBSECTIONS};
pub use diff::{DiffLine, line_diff};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use files::{
    ApplyReport, ArtifactIssue, ArtifactMutator, ArtifactOutcome, ArtifactPreview,
    ArtifactProblem, ArtifactResult, VersionedArtifact, read_version_source,
};
pub use host::{HostStatus, NOTES_FILE, ReleaseHost};
pub use interact::{AssumeYes, CancelFlag, Confirm};
pub use pipeline::{PipelineStep, Reach, StepFailure, StepKind, StepResult, StepRunner};
pub use process::{CommandOutput, CommandSpec, Executor, SystemExecutor};
pub use release::{
    ReleaseContext, ReleaseFailure, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome,
    ReleasePlan, ReleasePreview, ReleaseReport, ReleaseState,
};
pub use semver::Version;
pub use version::{BumpKind, VersionManager};
