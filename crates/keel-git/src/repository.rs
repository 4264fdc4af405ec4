//! Git repository wrapper.

use std::path::Path;

use git2::{Repository as Git2Repo, StatusOptions};
use tracing::debug;

use crate::{GitError, GitResult};

/// A Git repository wrapper.
pub struct Repository {
    inner: Git2Repo,
}

impl Repository {
    /// Discovers the repository containing the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no repository is found.
    pub fn discover(start: impl AsRef<Path>) -> GitResult<Self> {
        let start = start.as_ref();
        let inner =
            Git2Repo::discover(start).map_err(|_| GitError::NotARepo(start.to_path_buf()))?;
        Ok(Self { inner })
    }

    /// Returns the repository root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.workdir().unwrap_or_else(|| self.inner.path())
    }

    /// Returns all tags in the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be read.
    pub fn tags(&self) -> GitResult<Vec<String>> {
        let tags = self
            .inner
            .tag_names(None)
            .map_err(GitError::query("list tags"))?;
        Ok(tags.iter().flatten().map(String::from).collect())
    }

    /// Returns whether a tag with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be read.
    pub fn tag_exists(&self, name: &str) -> GitResult<bool> {
        let exists = self
            .inner
            .tag_names(Some(name))
            .map_err(GitError::query("list tags"))?
            .iter()
            .flatten()
            .any(|t| t == name);
        debug!(tag = name, exists, "checked tag");
        Ok(exists)
    }

    /// Returns the latest tag matching a version pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be read.
    pub fn latest_version_tag(&self, prefix: &str) -> GitResult<Option<String>> {
        let tags = self.tags()?;

        let mut version_tags: Vec<_> = tags
            .into_iter()
            .filter(|t| t.starts_with(prefix))
            .filter_map(|t| {
                let version_str = t.strip_prefix(prefix)?;
                semver::Version::parse(version_str).ok().map(|v| (t, v))
            })
            .collect();

        // Sort by version descending
        version_tags.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(version_tags.into_iter().next().map(|(tag, _)| tag))
    }

    /// Returns the paths with uncommitted changes (untracked files excluded).
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be computed.
    pub fn dirty_paths(&self) -> GitResult<Vec<String>> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);

        let statuses = self
            .inner
            .statuses(Some(&mut options))
            .map_err(GitError::query("read working tree status"))?;
        Ok(statuses
            .iter()
            .filter(|entry| !entry.status().is_empty())
            .filter_map(|entry| entry.path().map(String::from))
            .collect())
    }
}
