//! Changelog command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use keel_core::{ChangelogLedger, ReleaseHost, VersionManager};

use super::load_project;

/// Arguments for the changelog command.
#[derive(Debug, Args)]
pub struct ChangelogArgs {
    #[command(subcommand)]
    pub command: ChangelogCommand,
}

#[derive(Debug, Subcommand)]
pub enum ChangelogCommand {
    /// Check that the pending section is ready for a release
    Check,

    /// Print the release notes for a released version
    Notes {
        /// Released version, e.g. 1.2.0
        version: String,
    },
}

/// Runs the changelog command.
pub fn run(args: &ChangelogArgs, dir: &Path) -> Result<()> {
    let (root, config) = load_project(dir)?;
    let ledger = ChangelogLedger::load(
        &root.join(&config.changelog.path),
        &config.version.tag_prefix,
    )
    .context("failed to read changelog")?;

    match &args.command {
        ChangelogCommand::Check => {
            let min = config.changelog.min_pending_chars;
            let Some(found) = ledger.pending_content_len() else {
                bail!(
                    "{} has no [Unreleased] section",
                    config.changelog.path
                );
            };
            if found < min {
                bail!(
                    "[Unreleased] section in {} has {found} characters of content; at least {min} required",
                    config.changelog.path
                );
            }
            println!("Changelog ready: {found} characters pending.");
            if let Some(entry) = ledger.pending_entry() {
                println!();
                println!("{entry}");
            }
        }
        ChangelogCommand::Notes { version } => {
            let version = VersionManager::new().parse(version)?;
            let Some(entry) = ledger.extract_entry(&version) else {
                bail!("no changelog entry for {version}");
            };
            let host = ReleaseHost::new(&config.release_host, &root);
            print!(
                "{}",
                host.compose_notes(&version, Some(&entry), &config.changelog.path)
            );
        }
    }

    Ok(())
}
