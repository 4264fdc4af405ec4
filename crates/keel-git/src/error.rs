//! Git error types.

use std::path::PathBuf;

use thiserror::Error;

/// Git-related errors.
#[derive(Debug, Error)]
pub enum GitError {
    /// No repository at or above the path.
    #[error("not a git repository: {}", .0.display())]
    NotARepo(PathBuf),

    /// A repository query failed.
    #[error("failed to {action}: {source}")]
    Query {
        action: &'static str,
        #[source]
        source: git2::Error,
    },
}

impl GitError {
    pub(crate) fn query(action: &'static str) -> impl FnOnce(git2::Error) -> Self {
        move |source| Self::Query { action, source }
    }
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;
