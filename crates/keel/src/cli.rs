//! CLI definition.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::commands;

/// Release a versioned project in one transactional step: bump, changelog,
/// test, build, deploy, commit, tag, push and publish.
#[derive(Debug, Parser)]
#[command(name = "keel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Run as if keel was started in this directory
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a full release
    Release(commands::release::ReleaseArgs),

    /// Show the current and next version
    Version(commands::version::VersionArgs),

    /// Inspect the changelog
    Changelog(commands::changelog::ChangelogArgs),

    /// Write a default keel.toml
    Init(commands::init::InitArgs),
}

impl Cli {
    /// Runs the CLI command.
    pub fn run(self) -> Result<()> {
        let dir = match self.directory {
            Some(dir) => dir
                .canonicalize()
                .with_context(|| format!("cannot access directory {}", dir.display()))?,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };

        match self.command {
            Commands::Release(args) => commands::release::run(&args, &dir),
            Commands::Version(args) => commands::version::run(&args, &dir),
            Commands::Changelog(args) => commands::changelog::run(&args, &dir),
            Commands::Init(args) => commands::init::run(&args, &dir),
        }
    }
}
