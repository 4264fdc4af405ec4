//! Read-only Git queries for Keel.
//!
//! Release writes (commit, tag, push) go through the external `git` command so
//! they share the pipeline's failure handling. This crate only answers
//! pre-flight questions:
//! - Repository discovery
//! - Tag lookup
//! - Working tree cleanliness

mod error;
mod repository;

pub use error::{GitError, GitResult};
pub use repository::Repository;
