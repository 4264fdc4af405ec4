//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use keel_config::{Config, find_and_load_config_from};
use keel_core::BumpKind;

pub mod changelog;
pub mod init;
pub mod release;
pub mod version;

/// Bump type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BumpTypeArg {
    /// Major version bump (breaking changes)
    Major,
    /// Minor version bump (new features)
    Minor,
    /// Patch version bump (bug fixes)
    Patch,
}

impl From<BumpTypeArg> for BumpKind {
    fn from(arg: BumpTypeArg) -> Self {
        match arg {
            BumpTypeArg::Major => BumpKind::Major,
            BumpTypeArg::Minor => BumpKind::Minor,
            BumpTypeArg::Patch => BumpKind::Patch,
        }
    }
}

/// Finds `keel.toml` in `dir` or a parent; returns the project root and config.
fn load_project(dir: &Path) -> Result<(PathBuf, Config)> {
    find_and_load_config_from(dir)
        .context("failed to load configuration (run `keel init` to create one)")
}
