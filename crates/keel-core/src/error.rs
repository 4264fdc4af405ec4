//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::files::ArtifactIssue;
use crate::pipeline::StepFailure;
use crate::version::BumpKind;

/// Core-related errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] keel_config::ConfigError),

    /// Text that is not a `MAJOR.MINOR.PATCH` version.
    #[error("invalid version format: {0:?}")]
    InvalidVersion(String),

    /// The bumped component would not fit in a `u64`.
    #[error("cannot apply a {kind} bump to {version}: component overflows")]
    VersionOverflow { version: String, kind: BumpKind },

    /// File not found.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Version not found in file.
    #[error("version not found in {0}")]
    VersionNotFound(String),

    /// Failed to parse a file.
    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    /// A configured regular expression does not compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The changelog does not exist.
    #[error("changelog not found: {0}")]
    ChangelogMissing(String),

    /// The pending changelog section is absent or too short.
    #[error(
        "pending changelog section needs at least {required} characters of content (found {found})"
    )]
    PendingTooShort { found: usize, required: usize },

    /// A changelog section was not found.
    #[error("changelog section not found: [{0}]")]
    SectionNotFound(String),

    /// The changelog already has a section for the version.
    #[error("changelog already has a section for [{0}]")]
    DuplicateSection(String),

    /// One or more declared artifacts could not be updated.
    #[error("artifacts not updated: {}", describe_issues(.0))]
    ArtifactsNotUpdated(Vec<ArtifactIssue>),

    /// A backup directory from an earlier run is still present.
    #[error("backup directory {} already exists; inspect and remove it before releasing", .0.display())]
    StaleBackup(PathBuf),

    /// The backup staging area could not be prepared.
    #[error("failed to stage backups in {}: {source}", path.display())]
    BackupStaging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required pipeline step failed.
    #[error(transparent)]
    Step(#[from] Box<StepFailure>),

    /// The operator interrupted the release.
    #[error("release interrupted")]
    Interrupted,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before anything was touched.
    Validation,
    /// A local file could not be rewritten as declared.
    Mutation,
    /// An external command failed.
    Step,
    /// The operator cancelled the run.
    Interrupted,
    /// Filesystem failure.
    Io,
}

impl CoreError {
    /// Returns the error's classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::InvalidVersion(_)
            | Self::VersionOverflow { .. }
            | Self::FileNotFound(_)
            | Self::VersionNotFound(_)
            | Self::Parse { .. }
            | Self::InvalidPattern { .. }
            | Self::ChangelogMissing(_)
            | Self::PendingTooShort { .. }
            | Self::StaleBackup(_) => ErrorKind::Validation,
            Self::SectionNotFound(_) | Self::DuplicateSection(_) | Self::ArtifactsNotUpdated(_) => {
                ErrorKind::Mutation
            }
            Self::Step(_) => ErrorKind::Step,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::BackupStaging { .. } | Self::Io(_) => ErrorKind::Io,
        }
    }
}

fn describe_issues(issues: &[ArtifactIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
