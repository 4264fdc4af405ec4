//! Version sources and artifact rewriting.
//!
//! The canonical version is read from one file:
//! - Cargo.toml (TOML `version = "..."` line)
//! - package.json (JSON `version` key)
//! - any file via a configured regex, or the whole trimmed content
//!
//! Declared artifacts are then rewritten by a single substitution routine
//! driven by each artifact's matcher and occurrence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use keel_config::{ArtifactConfig, MatcherKind, Occurrence, VersionConfig};
use regex::{NoExpand, Regex};
use semver::Version;
use tracing::{debug, info, warn};

use crate::diff::{DiffLine, line_diff};
use crate::{CoreError, CoreResult, VersionManager};

const PLACEHOLDER: &str = "{version}";

/// Reads the current version from the configured version source.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist
/// - The configured pattern is invalid or does not match
/// - The version field is not found in the file
/// - The version string is not `MAJOR.MINOR.PATCH`
pub fn read_version_source(root: &Path, config: &VersionConfig) -> CoreResult<Version> {
    let path = root.join(&config.source);
    if !path.exists() {
        return Err(CoreError::FileNotFound(config.source.clone()));
    }

    let content = fs::read_to_string(&path)?;

    let raw = if let Some(pattern) = &config.pattern {
        read_with_pattern(&content, pattern, &config.source)?
    } else {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        match (filename, path.extension().and_then(|e| e.to_str())) {
            ("Cargo.toml", _) | (_, Some("toml")) => read_toml_version(&content, &config.source)?,
            ("package.json", _) | (_, Some("json")) => {
                read_json_version(&content, &config.source)?
            }
            _ => content.trim().to_string(),
        }
    };

    debug!(source = %config.source, version = %raw, "read version source");
    VersionManager::new().parse(&raw)
}

fn read_with_pattern(content: &str, pattern: &str, file: &str) -> CoreResult<String> {
    let regex = compile(pattern)?;
    let captures = regex
        .captures(content)
        .ok_or_else(|| CoreError::VersionNotFound(file.to_string()))?;

    let matched = captures.get(1).or_else(|| captures.get(0));
    Ok(matched.map(|m| m.as_str().to_string()).unwrap_or_default())
}

fn read_toml_version(content: &str, file: &str) -> CoreResult<String> {
    let version_regex = compile(r#"(?m)^\s*version\s*=\s*"([^"]+)""#)?;

    let captures = version_regex
        .captures(content)
        .ok_or_else(|| CoreError::VersionNotFound(file.to_string()))?;

    Ok(captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

fn read_json_version(content: &str, file: &str) -> CoreResult<String> {
    let json: serde_json::Value =
        serde_json::from_str(content).map_err(|e| CoreError::Parse {
            file: file.to_string(),
            reason: e.to_string(),
        })?;

    json.get("version")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| CoreError::VersionNotFound(file.to_string()))
}

fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern).map_err(|e| CoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Why an artifact could not be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactProblem {
    /// The file does not exist.
    NotFound,
    /// The file does not contain the search pattern.
    PatternNotMatched,
}

impl fmt::Display for ArtifactProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::PatternNotMatched => write!(f, "pattern not matched"),
        }
    }
}

/// An artifact that could not be updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIssue {
    /// Artifact path as declared.
    pub path: String,
    /// What went wrong.
    pub problem: ArtifactProblem,
}

impl fmt::Display for ArtifactIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.problem)
    }
}

/// Outcome of rewriting one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Content changed and was written back.
    Updated { replacements: usize },
    /// Matches were found but the replacement left the content unchanged.
    Unchanged,
    /// Not updated.
    Failed(ArtifactProblem),
}

/// Result of rewriting one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResult {
    /// Artifact path as declared.
    pub path: String,
    /// Whether failures are only warnings.
    pub optional: bool,
    /// What happened.
    pub outcome: ArtifactOutcome,
}

/// Aggregated results of [`ArtifactMutator::apply_version`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// One entry per declared artifact, in declaration order.
    pub results: Vec<ArtifactResult>,
}

impl ApplyReport {
    /// Number of artifacts written back.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ArtifactOutcome::Updated { .. }))
            .count()
    }

    /// Failures of required artifacts.
    #[must_use]
    pub fn issues(&self) -> Vec<ArtifactIssue> {
        self.failures(false)
    }

    /// Failures of optional artifacts.
    #[must_use]
    pub fn warnings(&self) -> Vec<ArtifactIssue> {
        self.failures(true)
    }

    fn failures(&self, optional: bool) -> Vec<ArtifactIssue> {
        self.results
            .iter()
            .filter(|r| r.optional == optional)
            .filter_map(|r| match r.outcome {
                ArtifactOutcome::Failed(problem) => Some(ArtifactIssue {
                    path: r.path.clone(),
                    problem,
                }),
                _ => None,
            })
            .collect()
    }
}

/// Planned changes to one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPreview {
    /// Artifact path as declared.
    pub path: String,
    /// Changed lines, or the problem that would be reported.
    pub changes: Result<Vec<DiffLine>, ArtifactProblem>,
}

/// A declared file holding the version string.
#[derive(Debug, Clone)]
pub struct VersionedArtifact {
    /// Path as declared, relative to the project root.
    pub display: String,
    /// Absolute path.
    pub path: PathBuf,
    matcher: MatcherKind,
    search: String,
    replace: String,
    occurrence: Occurrence,
    optional: bool,
}

impl VersionedArtifact {
    /// Builds an artifact from its configuration.
    #[must_use]
    pub fn from_config(root: &Path, config: &ArtifactConfig) -> Self {
        Self {
            display: config.path.clone(),
            path: root.join(&config.path),
            matcher: config.matcher,
            search: config.search.clone(),
            replace: config
                .replace
                .clone()
                .unwrap_or_else(|| config.search.clone()),
            occurrence: config.occurrence,
            optional: config.optional,
        }
    }

    /// Substitutes the old version for the new one in `content`.
    ///
    /// Returns the rewritten content and the number of replacements, or
    /// `None` when the pattern does not match.
    ///
    /// # Errors
    ///
    /// Returns an error if a regex matcher does not compile.
    pub fn substitute(
        &self,
        content: &str,
        old: &Version,
        new: &Version,
    ) -> CoreResult<Option<(String, usize)>> {
        let limit = match self.occurrence {
            Occurrence::First => 1,
            Occurrence::All => usize::MAX,
        };
        let replacement = self.replace.replace(PLACEHOLDER, &new.to_string());

        match self.matcher {
            MatcherKind::Literal => {
                let needle = self.search.replace(PLACEHOLDER, &old.to_string());
                let guard_start = self.search.starts_with(PLACEHOLDER);
                let guard_end = self.search.ends_with(PLACEHOLDER);

                let positions: Vec<usize> = content
                    .match_indices(&needle)
                    .map(|(at, _)| at)
                    .filter(|&at| {
                        (!guard_start || boundary_before(content, at))
                            && (!guard_end || boundary_after(content, at + needle.len()))
                    })
                    .take(limit)
                    .collect();

                if positions.is_empty() {
                    return Ok(None);
                }

                let mut out = String::with_capacity(content.len());
                let mut last = 0;
                for &at in &positions {
                    out.push_str(&content[last..at]);
                    out.push_str(&replacement);
                    last = at + needle.len();
                }
                out.push_str(&content[last..]);

                Ok(Some((out, positions.len())))
            }
            MatcherKind::Regex => {
                let escaped = regex::escape(&old.to_string());
                let regex = compile(&self.search.replace(PLACEHOLDER, &escaped))?;

                let count = regex.find_iter(content).take(limit).count();
                if count == 0 {
                    return Ok(None);
                }

                // `$` in the template is literal text, not a group reference
                let limit = if limit == usize::MAX { 0 } else { limit };
                let out = regex
                    .replacen(content, limit, NoExpand(replacement.as_str()))
                    .into_owned();
                Ok(Some((out, count)))
            }
        }
    }
}

/// A version text must not be glued to a longer number (`10.3.1` vs `0.3.1`).
fn boundary_before(content: &str, at: usize) -> bool {
    content[..at]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_ascii_digit() && c != '.')
}

fn boundary_after(content: &str, end: usize) -> bool {
    let mut rest = content[end..].chars();
    match rest.next() {
        None => true,
        Some(c) if c.is_ascii_digit() => false,
        Some('.') => !rest.next().is_some_and(|c| c.is_ascii_digit()),
        Some(_) => true,
    }
}

/// Applies version substitutions across the declared artifacts.
pub struct ArtifactMutator {
    artifacts: Vec<VersionedArtifact>,
}

impl ArtifactMutator {
    /// Creates a mutator for the configured artifacts.
    #[must_use]
    pub fn new(root: &Path, artifacts: &[ArtifactConfig]) -> Self {
        Self {
            artifacts: artifacts
                .iter()
                .map(|a| VersionedArtifact::from_config(root, a))
                .collect(),
        }
    }

    /// Returns the absolute paths of all declared artifacts, deduplicated.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for artifact in &self.artifacts {
            if !paths.contains(&artifact.path) {
                paths.push(artifact.path.clone());
            }
        }
        paths
    }

    /// Rewrites every artifact from `old` to `new`.
    ///
    /// Files are written only when their content changes. Missing files and
    /// unmatched patterns are collected in the report rather than aborting;
    /// the caller decides whether they are fatal. Must only be called once a
    /// backup of the same files exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or written, or a regex
    /// matcher does not compile.
    pub fn apply_version(&self, old: &Version, new: &Version) -> CoreResult<ApplyReport> {
        let mut report = ApplyReport::default();

        for artifact in &self.artifacts {
            let outcome = if artifact.path.exists() {
                let content = fs::read_to_string(&artifact.path)?;
                match artifact.substitute(&content, old, new)? {
                    Some((updated, replacements)) if updated != content => {
                        fs::write(&artifact.path, updated)?;
                        info!(
                            path = %artifact.display,
                            replacements,
                            "updated {}: {old} -> {new}",
                            artifact.display
                        );
                        ArtifactOutcome::Updated { replacements }
                    }
                    Some(_) => ArtifactOutcome::Unchanged,
                    None => ArtifactOutcome::Failed(ArtifactProblem::PatternNotMatched),
                }
            } else {
                ArtifactOutcome::Failed(ArtifactProblem::NotFound)
            };

            if let ArtifactOutcome::Failed(problem) = outcome {
                warn!(path = %artifact.display, %problem, "artifact not updated");
            }

            report.results.push(ArtifactResult {
                path: artifact.display.clone(),
                optional: artifact.optional,
                outcome,
            });
        }

        Ok(report)
    }

    /// Computes the changes `apply_version` would make, without writing.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or a regex does not compile.
    pub fn preview(&self, old: &Version, new: &Version) -> CoreResult<Vec<ArtifactPreview>> {
        let mut previews = Vec::with_capacity(self.artifacts.len());

        for artifact in &self.artifacts {
            let changes = if artifact.path.exists() {
                let content = fs::read_to_string(&artifact.path)?;
                match artifact.substitute(&content, old, new)? {
                    Some((updated, _)) => Ok(line_diff(&content, &updated)),
                    None => Err(ArtifactProblem::PatternNotMatched),
                }
            } else {
                Err(ArtifactProblem::NotFound)
            };

            previews.push(ArtifactPreview {
                path: artifact.display.clone(),
                changes,
            });
        }

        Ok(previews)
    }
}
