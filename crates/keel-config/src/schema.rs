//! Configuration schema.

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Version source configuration.
    #[serde(default)]
    pub version: VersionConfig,

    /// Files whose version strings are rewritten on release.
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<ArtifactConfig>,

    /// Changelog configuration.
    #[serde(default)]
    pub changelog: ChangelogConfig,

    /// Build tool commands.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Version control configuration.
    #[serde(default)]
    pub git: GitConfig,

    /// Hosted release configuration.
    #[serde(default)]
    pub release_host: ReleaseHostConfig,

    /// Backup configuration.
    #[serde(default)]
    pub backup: BackupConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: VersionConfig::default(),
            artifacts: default_artifacts(),
            changelog: ChangelogConfig::default(),
            commands: CommandsConfig::default(),
            git: GitConfig::default(),
            release_host: ReleaseHostConfig::default(),
            backup: BackupConfig::default(),
        }
    }
}

impl Config {
    /// Returns the tag name for a version string (e.g., "v1.2.3").
    #[must_use]
    pub fn tag_name(&self, version: &str) -> String {
        format!("{}{version}", self.version.tag_prefix)
    }
}

fn default_artifacts() -> Vec<ArtifactConfig> {
    vec![ArtifactConfig {
        path: "Cargo.toml".to_string(),
        search: r#"version = "{version}""#.to_string(),
        replace: None,
        matcher: MatcherKind::Literal,
        occurrence: Occurrence::First,
        optional: false,
    }]
}

/// Version source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConfig {
    /// File holding the canonical version string.
    #[serde(default = "default_version_source")]
    pub source: String,

    /// Regex whose first capture group is the version (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Tag prefix (e.g., "v").
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            source: default_version_source(),
            pattern: None,
            tag_prefix: default_tag_prefix(),
        }
    }
}

fn default_version_source() -> String {
    "Cargo.toml".to_string()
}

fn default_tag_prefix() -> String {
    "v".to_string()
}

/// How an artifact's search text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Plain text; `{version}` expands to the current version.
    #[default]
    Literal,
    /// Regular expression; `{version}` expands to the escaped current version.
    Regex,
}

/// Which matches of an artifact pattern are replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occurrence {
    /// Only the first match.
    #[default]
    First,
    /// Every match.
    All,
}

/// A file containing a version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Path relative to the project root.
    pub path: String,

    /// Search template containing `{version}`.
    pub search: String,

    /// Replacement template; defaults to the search template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,

    /// Matcher kind.
    #[serde(default)]
    pub matcher: MatcherKind,

    /// Occurrences to replace.
    #[serde(default)]
    pub occurrence: Occurrence,

    /// Report a missing file or match as a warning instead of an error.
    #[serde(default)]
    pub optional: bool,
}

/// Changelog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogConfig {
    /// Changelog path.
    #[serde(default = "default_changelog_path")]
    pub path: String,

    /// Minimum number of characters in the pending section.
    #[serde(default = "default_min_pending_chars")]
    pub min_pending_chars: usize,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            path: default_changelog_path(),
            min_pending_chars: default_min_pending_chars(),
        }
    }
}

fn default_changelog_path() -> String {
    "CHANGELOG.md".to_string()
}

fn default_min_pending_chars() -> usize {
    20
}

/// Build tool commands, as argument vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Runs the test suite.
    #[serde(default = "default_test_command")]
    pub test: Vec<String>,

    /// Builds the package.
    #[serde(default = "default_build_command")]
    pub build: Vec<String>,

    /// Deploys the package to its registry.
    #[serde(default = "default_deploy_command")]
    pub deploy: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            test: default_test_command(),
            build: default_build_command(),
            deploy: default_deploy_command(),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

fn default_test_command() -> Vec<String> {
    argv(&["cargo", "test"])
}

fn default_build_command() -> Vec<String> {
    argv(&["cargo", "build", "--release"])
}

fn default_deploy_command() -> Vec<String> {
    argv(&["cargo", "publish"])
}

/// Version control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Git executable.
    #[serde(default = "default_git_program")]
    pub program: String,

    /// Commit message template.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Annotated tag message template.
    #[serde(default = "default_tag_message")]
    pub tag_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_git_program(),
            commit_message: default_commit_message(),
            tag_message: default_tag_message(),
        }
    }
}

fn default_git_program() -> String {
    "git".to_string()
}

fn default_commit_message() -> String {
    "Bump version to {version}".to_string()
}

fn default_tag_message() -> String {
    "Release {version}".to_string()
}

/// Hosted release configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseHostConfig {
    /// Release host CLI executable.
    #[serde(default = "default_host_program")]
    pub program: String,

    /// Release title template.
    #[serde(default = "default_release_title")]
    pub title: String,

    /// Binary asset to attach, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,

    /// Display label of the attached asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_label: Option<String>,

    /// Text appended to the release notes; `{version}` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_footer: Option<String>,

    /// Repository URL used in fallback notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
}

impl Default for ReleaseHostConfig {
    fn default() -> Self {
        Self {
            program: default_host_program(),
            title: default_release_title(),
            asset: None,
            asset_label: None,
            notes_footer: None,
            repository_url: None,
        }
    }
}

fn default_host_program() -> String {
    "gh".to_string()
}

fn default_release_title() -> String {
    "Release {version}".to_string()
}

/// Backup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Staging directory, relative to the project root.
    #[serde(default = "default_backup_dir")]
    pub dir: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
        }
    }
}

fn default_backup_dir() -> String {
    ".release-backup".to_string()
}
