//! Configuration management for Keel.
//!
//! This crate handles loading and validating the `keel.toml` configuration file.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_FILE_NAME, find_and_load_config_from, load_config, validate};
pub use schema::{
    ArtifactConfig, BackupConfig, ChangelogConfig, CommandsConfig, Config, GitConfig,
    MatcherKind, Occurrence, ReleaseHostConfig, VersionConfig,
};
