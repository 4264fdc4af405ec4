//! Initialize command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Args;
use keel_config::{ArtifactConfig, CONFIG_FILE_NAME, Config};

/// Arguments for the init command.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,
}

const LOCK_NOTE: &str = "#
# Files are backed up and restored on failure only when listed under
# [[artifacts]]. Keep the Cargo.lock entry if the lock file is committed.
";

/// Runs the init command.
pub fn run(args: &InitArgs, dir: &Path) -> Result<()> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let config = detect(dir);
    let body = toml::to_string_pretty(&config).context("failed to serialize configuration")?;
    let mut content = String::from("# Keel release configuration\n");
    if config.version.source == "Cargo.toml" {
        content.push_str(LOCK_NOTE);
    }
    content.push('\n');
    content.push_str(&body);

    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "Created {} (version source: {})",
        path.display(),
        config.version.source
    );

    Ok(())
}

/// Default configuration, adapted to an npm project when there is no Cargo.toml.
fn detect(dir: &Path) -> Config {
    let mut config = Config::default();
    if dir.join("Cargo.toml").exists() || !dir.join("package.json").exists() {
        if let Some(name) = package_name(dir) {
            config.artifacts.push(ArtifactConfig {
                path: "Cargo.lock".to_string(),
                search: format!("name = \"{name}\"\nversion = \"{{version}}\""),
                optional: true,
                ..config.artifacts[0].clone()
            });
        }
        return config;
    }

    config.version.source = "package.json".to_string();
    config.artifacts = vec![ArtifactConfig {
        path: "package.json".to_string(),
        search: "\"version\": \"{version}\"".to_string(),
        ..config.artifacts[0].clone()
    }];
    let npm = |args: &[&str]| -> Vec<String> {
        std::iter::once("npm")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    };
    config.commands.test = npm(&["test"]);
    config.commands.build = npm(&["run", "build"]);
    config.commands.deploy = npm(&["publish"]);
    config
}

/// Package name from Cargo.toml; `None` for a virtual workspace.
fn package_name(dir: &Path) -> Option<String> {
    let manifest: toml::Table = fs::read_to_string(dir.join("Cargo.toml"))
        .ok()?
        .parse()
        .ok()?;
    manifest
        .get("package")?
        .get("name")?
        .as_str()
        .map(String::from)
}
