//! Hosted release entries (`gh release create` and compatible CLIs).

use std::path::{Path, PathBuf};

use keel_config::ReleaseHostConfig;
use semver::Version;
use tracing::debug;

use crate::process::{CommandSpec, Executor};

/// Temporary notes file written into the project root.
pub const NOTES_FILE: &str = ".release-notes.md";

/// Whether the release host CLI can be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    /// Installed and authenticated.
    Ready,
    /// Not installed or not runnable.
    Missing(String),
    /// Installed but not logged in.
    Unauthenticated(String),
}

/// Builds release-host commands from configuration.
pub struct ReleaseHost<'a> {
    config: &'a ReleaseHostConfig,
    root: &'a Path,
}

impl<'a> ReleaseHost<'a> {
    /// Creates a host for the project at `root`.
    pub fn new(config: &'a ReleaseHostConfig, root: &'a Path) -> Self {
        Self { config, root }
    }

    /// Runs `<program> --version` then `<program> auth status`.
    pub fn status(&self, executor: &dyn Executor) -> HostStatus {
        let program = &self.config.program;

        match executor.execute(&CommandSpec::new(program).arg("--version"), self.root) {
            Ok(output) if output.success() => {}
            Ok(output) => {
                return HostStatus::Missing(format!(
                    "{program} --version exited with status {}",
                    output.exit_code
                ));
            }
            Err(e) => return HostStatus::Missing(format!("{program} not found: {e}")),
        }

        let auth = CommandSpec::new(program).args(["auth", "status"]);
        match executor.execute(&auth, self.root) {
            Ok(output) if output.success() => HostStatus::Ready,
            Ok(_) => HostStatus::Unauthenticated(format!(
                "{program} is not authenticated; run `{program} auth login`"
            )),
            Err(e) => HostStatus::Unauthenticated(format!(
                "could not check {program} auth status: {e}"
            )),
        }
    }

    /// Path of the temporary notes file.
    #[must_use]
    pub fn notes_path(&self) -> PathBuf {
        self.root.join(NOTES_FILE)
    }

    /// Release notes: heading, changelog entry (or a fallback) and footer.
    #[must_use]
    pub fn compose_notes(
        &self,
        version: &Version,
        entry: Option<&str>,
        changelog_path: &str,
    ) -> String {
        let body = entry.map_or_else(
            || match &self.config.repository_url {
                Some(url) => format!(
                    "Release {version}\n\nSee [{changelog_path}]({}/blob/main/{changelog_path}) for details.",
                    url.trim_end_matches('/')
                ),
                None => format!("Release {version}\n\nSee {changelog_path} for details."),
            },
            str::to_string,
        );

        let mut notes = format!("# Release {version}\n\n{body}\n");
        if let Some(footer) = &self.config.notes_footer {
            notes.push('\n');
            notes.push_str(footer.replace("{version}", &version.to_string()).trim_end());
            notes.push('\n');
        }
        notes
    }

    /// The `release create` command, and a warning when the configured
    /// asset does not exist.
    #[must_use]
    pub fn create_command(&self, tag: &str, version: &Version) -> (CommandSpec, Option<String>) {
        let title = self.config.title.replace("{version}", &version.to_string());
        let mut command = CommandSpec::new(&self.config.program)
            .args(["release", "create", tag, "--title"])
            .arg(title)
            .arg("--notes-file")
            .arg(self.notes_path().display().to_string());

        let mut warning = None;
        if let Some(asset) = &self.config.asset {
            let path = self.root.join(asset);
            if path.exists() {
                let label = self.config.asset_label.clone().unwrap_or_else(|| {
                    path.file_name()
                        .map_or_else(|| asset.clone(), |n| n.to_string_lossy().into_owned())
                });
                command = command.arg(format!("{}#{label}", path.display()));
            } else {
                warning = Some(format!(
                    "asset {asset} not found, creating release without it"
                ));
            }
        }

        debug!(command = %command, "release host command");
        (command, warning)
    }
}
