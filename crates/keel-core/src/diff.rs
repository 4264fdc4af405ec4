//! Line diffs for dry-run previews.

use std::fmt;

use similar::{ChangeTag, TextDiff};

/// A changed line, numbered from 1 in its own document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Line present only in the original text.
    Removed { line: usize, text: String },
    /// Line present only in the rewritten text.
    Added { line: usize, text: String },
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed { text, .. } => write!(f, "- {text}"),
            Self::Added { text, .. } => write!(f, "+ {text}"),
        }
    }
}

/// Computes the changed lines between two texts.
pub fn line_diff(before: &str, after: &str) -> Vec<DiffLine> {
    let diff = TextDiff::from_lines(before, after);

    diff.iter_all_changes()
        .filter_map(|change| {
            // values keep their line terminator
            let text = change.value().lines().next().unwrap_or_default().to_string();
            match change.tag() {
                ChangeTag::Delete => change.old_index().map(|i| DiffLine::Removed {
                    line: i + 1,
                    text,
                }),
                ChangeTag::Insert => change.new_index().map(|j| DiffLine::Added {
                    line: j + 1,
                    text,
                }),
                ChangeTag::Equal => None,
            }
        })
        .collect()
}
