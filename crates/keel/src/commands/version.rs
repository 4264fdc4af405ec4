//! Version command.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use keel_core::{BumpKind, VersionManager, read_version_source};
use keel_git::Repository;
use tracing::debug;

use super::{BumpTypeArg, load_project};

/// Arguments for the version command.
#[derive(Debug, Args)]
pub struct VersionArgs {
    /// Bump type used to compute the next version
    #[arg(short = 't', long, value_enum, default_value = "minor")]
    pub bump_type: BumpTypeArg,
}

/// Runs the version command.
pub fn run(args: &VersionArgs, dir: &Path) -> Result<()> {
    let (root, config) = load_project(dir)?;

    let current = read_version_source(&root, &config.version)
        .with_context(|| format!("failed to read version from {}", config.version.source))?;
    let kind = BumpKind::from(args.bump_type);
    let next = VersionManager::new().bump(&current, kind)?;

    println!("{current} -> {next} ({kind})");
    println!("next tag: {}", config.tag_name(&next.to_string()));

    match Repository::discover(&root) {
        Ok(repo) => {
            let latest = repo
                .latest_version_tag(&config.version.tag_prefix)
                .context("failed to read repository tags")?;
            match latest {
                Some(tag) => println!("latest tag: {tag}"),
                None => println!("latest tag: none"),
            }
        }
        Err(e) => debug!(error = %e, "no repository, skipping tag lookup"),
    }

    Ok(())
}
