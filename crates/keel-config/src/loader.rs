//! Configuration loader.

use std::path::Path;

use tracing::debug;

use crate::{Config, ConfigError, ConfigResult, MatcherKind};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Loads and validates configuration from the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or fails validation.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    debug!(?path, "loading configuration");

    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;
    debug!(artifacts = config.artifacts.len(), "configuration loaded");

    Ok(config)
}

/// Finds and loads configuration starting from the given directory.
///
/// Walks up the directory tree until a configuration file is found. Returns
/// the directory holding the file (the project root) with the configuration.
///
/// # Errors
///
/// Returns an error if no configuration file is found or it cannot be parsed.
pub fn find_and_load_config_from(
    start_dir: impl AsRef<Path>,
) -> ConfigResult<(std::path::PathBuf, Config)> {
    let start_dir = start_dir.as_ref();
    let mut dir = start_dir;

    loop {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let config = load_config(config_path)?;
            return Ok((dir.to_path_buf(), config));
        }

        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }

    Err(ConfigError::NotFound(start_dir.join(CONFIG_FILE_NAME)))
}

/// Checks values that deserialize fine but cannot drive a release.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] describing the first offending value.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.commands.build.is_empty() {
        return Err(ConfigError::invalid("commands.build", "is empty"));
    }
    // test and deploy may be left empty to skip the step
    let commands = [
        ("commands.test", &config.commands.test),
        ("commands.build", &config.commands.build),
        ("commands.deploy", &config.commands.deploy),
    ];
    for (name, argv) in commands {
        if argv.first().is_some_and(|program| program.trim().is_empty()) {
            return Err(ConfigError::invalid(name, "has a blank program"));
        }
    }

    for (index, artifact) in config.artifacts.iter().enumerate() {
        if artifact.path.trim().is_empty() {
            return Err(ConfigError::invalid(format!("artifacts[{index}].path"), "is empty"));
        }
        if !artifact.search.contains("{version}") {
            return Err(ConfigError::invalid(
                format!("artifacts[{index}].search"),
                "must contain {version}",
            ));
        }
        if artifact.matcher == MatcherKind::Regex && artifact.replace.is_none() {
            return Err(ConfigError::invalid(
                format!("artifacts[{index}].replace"),
                "is required for regex matchers",
            ));
        }
    }

    if config.version.source.trim().is_empty() {
        return Err(ConfigError::invalid("version.source", "is empty"));
    }

    if config.backup.dir.trim().is_empty() {
        return Err(ConfigError::invalid("backup.dir", "is empty"));
    }

    Ok(())
}
