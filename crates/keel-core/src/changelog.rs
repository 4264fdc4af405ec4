//! Keep-a-Changelog document handling.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use semver::Version;
use tracing::debug;

use crate::diff::{DiffLine, line_diff};
use crate::{CoreError, CoreResult};

/// Label of the pending section heading.
pub const PENDING_LABEL: &str = "Unreleased";

/// Subsections inserted under a fresh pending heading.
pub const TEMPLATE_SUBSECTIONS: [&str; 6] = [
    "Added",
    "Changed",
    "Deprecated",
    "Removed",
    "Fixed",
    "Security",
];

/// Byte ranges of one `## [label]` section.
struct Section {
    heading_start: usize,
    heading_end: usize,
    body_start: usize,
    body_end: usize,
}

/// A changelog document held in memory.
#[derive(Debug, Clone)]
pub struct ChangelogLedger {
    text: String,
    tag_prefix: String,
}

impl ChangelogLedger {
    /// Wraps changelog text.
    pub fn new(text: impl Into<String>, tag_prefix: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tag_prefix: tag_prefix.into(),
        }
    }

    /// Loads the changelog at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChangelogMissing`] if the file does not exist.
    pub fn load(path: &Path, tag_prefix: impl Into<String>) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ChangelogMissing(path.display().to_string()));
        }
        Ok(Self::new(fs::read_to_string(path)?, tag_prefix))
    }

    /// Returns the trimmed body of the pending section, if present.
    #[must_use]
    pub fn pending_entry(&self) -> Option<String> {
        self.find_section(PENDING_LABEL)
            .map(|s| self.text[s.body_start..s.body_end].trim().to_string())
    }

    /// Length of the pending section once empty subsections are elided.
    #[must_use]
    pub fn pending_content_len(&self) -> Option<usize> {
        self.find_section(PENDING_LABEL)
            .map(|s| elide_empty_subsections(&self.text[s.body_start..s.body_end]).chars().count())
    }

    /// Returns whether the pending section exists with at least `min` characters.
    #[must_use]
    pub fn validate_pending(&self, min: usize) -> bool {
        self.pending_content_len().is_some_and(|len| len >= min)
    }

    /// Like [`validate_pending`](Self::validate_pending), reporting the shortfall.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PendingTooShort`] when the section is absent or too short.
    pub fn check_pending(&self, min: usize) -> CoreResult<()> {
        let found = self.pending_content_len().unwrap_or(0);
        if self.validate_pending(min) {
            Ok(())
        } else {
            Err(CoreError::PendingTooShort {
                found,
                required: min,
            })
        }
    }

    /// Returns the document with the pending section released as `version`.
    ///
    /// The pending heading becomes `## [version] - date`, a fresh pending
    /// heading with empty template subsections is inserted above it, and the
    /// `[Unreleased]` compare link is re-anchored on the new version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateSection`] if `version` already has a
    /// section, or [`CoreError::SectionNotFound`] without a pending section.
    pub fn promote_pending(&self, version: &Version, date: NaiveDate) -> CoreResult<String> {
        let label = version.to_string();
        if self.find_section(&label).is_some() {
            return Err(CoreError::DuplicateSection(label));
        }

        let pending = self
            .find_section(PENDING_LABEL)
            .ok_or_else(|| CoreError::SectionNotFound(PENDING_LABEL.to_string()))?;

        let heading = &self.text[pending.heading_start..pending.heading_end];
        let nl = if heading.ends_with("\r\n") { "\r\n" } else { "\n" };

        let mut promoted = String::with_capacity(self.text.len() + 128);
        promoted.push_str(&self.text[..pending.heading_start]);
        promoted.push_str(&format!("## [{PENDING_LABEL}]{nl}{nl}"));
        for sub in TEMPLATE_SUBSECTIONS {
            promoted.push_str(&format!("### {sub}{nl}"));
        }
        promoted.push_str(nl);
        promoted.push_str(&format!("## [{label}] - {}{nl}", date.format("%Y-%m-%d")));
        promoted.push_str(&self.text[pending.heading_end..]);

        let promoted = self.rewrite_links(&promoted, version)?;
        debug!(version = %label, %date, "promoted pending changelog section");
        Ok(promoted)
    }

    /// Returns the body of a released section with empty subsections and
    /// blank lines elided, or `None` when absent or empty.
    #[must_use]
    pub fn extract_entry(&self, version: &Version) -> Option<String> {
        let section = self.find_section(&version.to_string())?;
        let entry = elide_empty_subsections(&self.text[section.body_start..section.body_end]);
        (!entry.is_empty()).then_some(entry)
    }

    /// Lines [`promote_pending`](Self::promote_pending) would change.
    ///
    /// # Errors
    ///
    /// Same as [`promote_pending`](Self::promote_pending).
    pub fn preview_promotion(&self, version: &Version, date: NaiveDate) -> CoreResult<Vec<DiffLine>> {
        let promoted = self.promote_pending(version, date)?;
        Ok(line_diff(&self.text, &promoted))
    }

    fn rewrite_links(&self, text: &str, version: &Version) -> CoreResult<String> {
        let prefix = regex::escape(&self.tag_prefix);
        let pattern = format!(
            r"(?m)^\[{PENDING_LABEL}\]:[ \t]*(\S+)/compare/{prefix}(\S+?)\.\.\.HEAD[ \t]*\r?$"
        );
        let link = Regex::new(&pattern).map_err(|e| CoreError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        let Some(captures) = link.captures(text) else {
            return Ok(text.to_string());
        };
        let (Some(whole), Some(base), Some(previous)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            return Ok(text.to_string());
        };

        let p = &self.tag_prefix;
        let (base, previous) = (base.as_str(), previous.as_str());
        // the match swallows a `\r` before the line break
        let eol = if whole.as_str().ends_with('\r') { "\r" } else { "" };
        let links = format!(
            "[{PENDING_LABEL}]: {base}/compare/{p}{version}...HEAD{eol}\n[{version}]: {base}/compare/{p}{previous}...{p}{version}{eol}"
        );

        Ok(format!(
            "{}{links}{}",
            &text[..whole.start()],
            &text[whole.end()..]
        ))
    }

    fn find_section(&self, label: &str) -> Option<Section> {
        let mut offset = 0;
        let mut heading: Option<(usize, usize)> = None;

        for line in self.text.split_inclusive('\n') {
            let start = offset;
            offset += line.len();

            match heading {
                None => {
                    if heading_label(line) == Some(label) {
                        heading = Some((start, offset));
                    }
                }
                Some((heading_start, heading_end)) => {
                    if heading_label(line).is_some() || is_link_definition(line) {
                        return Some(Section {
                            heading_start,
                            heading_end,
                            body_start: heading_end,
                            body_end: start,
                        });
                    }
                }
            }
        }

        heading.map(|(heading_start, heading_end)| Section {
            heading_start,
            heading_end,
            body_start: heading_end,
            body_end: self.text.len(),
        })
    }
}

/// Returns `label` for a `## [label]...` heading line.
fn heading_label(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("## [")?;
    let end = rest.find(']')?;
    Some(&rest[..end])
}

fn is_link_definition(line: &str) -> bool {
    line.starts_with('[')
        && line
            .find("]:")
            .is_some_and(|at| !line[1..at].contains(['[', ']']))
}

fn elide_empty_subsections(body: &str) -> String {
    let mut lines = Vec::new();
    let mut header: Option<&str> = None;

    for line in body.lines() {
        if line.starts_with("###") {
            header = Some(line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Some(h) = header.take() {
            lines.push(h);
        }
        lines.push(line);
    }

    lines.join("\n")
}
