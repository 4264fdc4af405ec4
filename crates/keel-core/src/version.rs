//! Version management.

use std::fmt;

use semver::Version;

use crate::{CoreError, CoreResult};

/// Which version component a release increments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BumpKind {
    /// Patch release (bug fixes).
    Patch,
    /// Minor release (new features).
    #[default]
    Minor,
    /// Major release (breaking changes).
    Major,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// Manages version operations.
///
/// Release versions are plain `MAJOR.MINOR.PATCH` triples: pre-release and
/// build metadata are rejected on input and never produced.
pub struct VersionManager;

impl VersionManager {
    /// Creates a new version manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses a `MAJOR.MINOR.PATCH` version string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidVersion`] unless the text is exactly three
    /// dot-separated non-negative integers.
    pub fn parse(&self, text: &str) -> CoreResult<Version> {
        let trimmed = text.trim();
        let version =
            Version::parse(trimmed).map_err(|_| CoreError::InvalidVersion(text.to_string()))?;

        if !version.pre.is_empty() || !version.build.is_empty() {
            return Err(CoreError::InvalidVersion(text.to_string()));
        }

        Ok(version)
    }

    /// Bumps a version according to the bump kind.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VersionOverflow`] when the bumped component is
    /// already `u64::MAX`.
    pub fn bump(&self, version: &Version, kind: BumpKind) -> CoreResult<Version> {
        let bumped = match kind {
            BumpKind::Major => version.major.checked_add(1).map(|major| Version::new(major, 0, 0)),
            BumpKind::Minor => version
                .minor
                .checked_add(1)
                .map(|minor| Version::new(version.major, minor, 0)),
            BumpKind::Patch => version
                .patch
                .checked_add(1)
                .map(|patch| Version::new(version.major, version.minor, patch)),
        };

        bumped.ok_or_else(|| CoreError::VersionOverflow {
            version: version.to_string(),
            kind,
        })
    }
}

impl Default for VersionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_major() {
        let vm = VersionManager::new();
        let bumped = vm.bump(&Version::new(1, 2, 3), BumpKind::Major).unwrap();
        assert_eq!(bumped, Version::new(2, 0, 0));
    }

    #[test]
    fn test_bump_minor() {
        let vm = VersionManager::new();
        let bumped = vm.bump(&Version::new(1, 2, 3), BumpKind::Minor).unwrap();
        assert_eq!(bumped, Version::new(1, 3, 0));
    }

    #[test]
    fn test_bump_patch() {
        let vm = VersionManager::new();
        let bumped = vm.bump(&Version::new(1, 2, 3), BumpKind::Patch).unwrap();
        assert_eq!(bumped, Version::new(1, 2, 4));
    }

    #[test]
    fn test_bump_laws() {
        let vm = VersionManager::new();
        for (x, y, z) in [(0, 0, 0), (0, 3, 1), (4, 0, 9), (10, 20, 30)] {
            let v = Version::new(x, y, z);
            assert_eq!(vm.bump(&v, BumpKind::Major).unwrap(), Version::new(x + 1, 0, 0));
            assert_eq!(vm.bump(&v, BumpKind::Minor).unwrap(), Version::new(x, y + 1, 0));
            assert_eq!(vm.bump(&v, BumpKind::Patch).unwrap(), Version::new(x, y, z + 1));
        }
    }

    #[test]
    fn test_bump_overflow_is_rejected() {
        let vm = VersionManager::new();
        let v = Version::new(u64::MAX, 5, 5);
        let result = vm.bump(&v, BumpKind::Major);
        assert!(matches!(
            result,
            Err(CoreError::VersionOverflow {
                kind: BumpKind::Major,
                ..
            })
        ));
        // components that do not overflow still bump
        assert_eq!(
            vm.bump(&v, BumpKind::Minor).unwrap(),
            Version::new(u64::MAX, 6, 0)
        );
        assert!(vm.bump(&Version::new(1, 2, u64::MAX), BumpKind::Patch).is_err());
    }

    #[test]
    fn test_default_bump_kind_is_minor() {
        assert_eq!(BumpKind::default(), BumpKind::Minor);
    }

    #[test]
    fn test_bump_kind_display() {
        assert_eq!(BumpKind::Major.to_string(), "major");
        assert_eq!(BumpKind::Minor.to_string(), "minor");
        assert_eq!(BumpKind::Patch.to_string(), "patch");
    }

    #[test]
    fn test_parse_valid() {
        let vm = VersionManager::new();
        assert_eq!(vm.parse("0.3.1").unwrap(), Version::new(0, 3, 1));
        assert_eq!(vm.parse(" 2.0.0\n").unwrap(), Version::new(2, 0, 0));
    }

    #[test]
    fn test_parse_display_is_lossless() {
        let vm = VersionManager::new();
        for text in ["0.0.0", "0.3.1", "1.22.333", "18446744073709551615.0.1"] {
            assert_eq!(vm.parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_invalid() {
        let vm = VersionManager::new();
        for text in [
            "",
            "1",
            "1.2",
            "1.2.3.4",
            "a.b.c",
            "-1.2.3",
            "1.2.3-alpha.1",
            "1.2.3+build.5",
            "01.2.3",
        ] {
            let result = vm.parse(text);
            assert!(
                matches!(result, Err(CoreError::InvalidVersion(_))),
                "{text:?} should be rejected"
            );
        }
    }
}
