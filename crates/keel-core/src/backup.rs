//! Pre-mutation snapshots of the files a release rewrites.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{CoreError, CoreResult};

/// Name of the index file written into the staging directory.
pub const MANIFEST_FILE: &str = "MANIFEST";

/// One captured file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Path the bytes were copied from.
    pub original: PathBuf,
    /// Slot holding the copy, `None` when the file did not exist at capture.
    pub slot: Option<PathBuf>,
}

/// Byte-identical copies of a set of files, taken before any mutation.
#[derive(Debug)]
pub struct BackupSet {
    dir: PathBuf,
    entries: Vec<Snapshot>,
}

impl BackupSet {
    /// Staging directory holding the copies.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captured entries in capture order.
    #[must_use]
    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }
}

/// Outcome of restoring a [`BackupSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Files copied back from their snapshot.
    pub restored: Vec<PathBuf>,
    /// Files without a snapshot.
    pub skipped: Vec<PathBuf>,
    /// Files that could not be copied back, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl RestoreReport {
    /// Returns whether every snapshot was copied back.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Creates, restores and discards [`BackupSet`]s in one staging directory.
#[derive(Debug, Clone)]
pub struct BackupVault {
    dir: PathBuf,
}

impl BackupVault {
    /// Creates a vault staging copies in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the staging directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies every existing path into its own slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StaleBackup`] if the staging directory already
    /// exists, or [`CoreError::BackupStaging`] if it cannot be created or a
    /// copy fails. Nothing is left behind on failure.
    pub fn capture(&self, paths: &[PathBuf]) -> CoreResult<BackupSet> {
        if self.dir.exists() {
            return Err(CoreError::StaleBackup(self.dir.clone()));
        }

        fs::create_dir_all(&self.dir).map_err(|source| CoreError::BackupStaging {
            path: self.dir.clone(),
            source,
        })?;

        match self.copy_all(paths) {
            Ok(set) => {
                info!(
                    dir = %self.dir.display(),
                    files = set.entries.iter().filter(|e| e.slot.is_some()).count(),
                    "captured backups"
                );
                Ok(set)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&self.dir) {
                    warn!(dir = %self.dir.display(), error = %cleanup, "could not remove partial backup");
                }
                Err(e)
            }
        }
    }

    fn copy_all(&self, paths: &[PathBuf]) -> CoreResult<BackupSet> {
        let mut entries = Vec::with_capacity(paths.len());
        let mut manifest = String::new();

        for (idx, original) in paths.iter().enumerate() {
            if !original.exists() {
                debug!(path = %original.display(), "nothing to back up");
                entries.push(Snapshot {
                    original: original.clone(),
                    slot: None,
                });
                continue;
            }

            let name = original
                .file_name()
                .map_or_else(|| "file".to_string(), |n| n.to_string_lossy().into_owned());
            let slot = self.dir.join(format!("{idx:02}-{name}"));

            fs::copy(original, &slot).map_err(|source| CoreError::BackupStaging {
                path: original.clone(),
                source,
            })?;
            debug!(path = %original.display(), slot = %slot.display(), "backed up");

            manifest.push_str(&format!("{}\t{}\n", slot.display(), original.display()));
            entries.push(Snapshot {
                original: original.clone(),
                slot: Some(slot),
            });
        }

        let manifest_path = self.dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, manifest).map_err(|source| CoreError::BackupStaging {
            path: manifest_path,
            source,
        })?;

        Ok(BackupSet {
            dir: self.dir.clone(),
            entries,
        })
    }

    /// Copies every snapshot back over its original path.
    ///
    /// Best effort per file; safe to call more than once.
    pub fn restore(&self, set: &BackupSet) -> RestoreReport {
        let mut report = RestoreReport::default();

        for entry in &set.entries {
            let Some(slot) = entry.slot.as_ref().filter(|s| s.exists()) else {
                report.skipped.push(entry.original.clone());
                continue;
            };

            match fs::copy(slot, &entry.original) {
                Ok(_) => {
                    info!(path = %entry.original.display(), "restored");
                    report.restored.push(entry.original.clone());
                }
                Err(e) => {
                    warn!(path = %entry.original.display(), error = %e, "restore failed");
                    report.failed.push((entry.original.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Removes the staging directory, consuming the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn discard(&self, set: BackupSet) -> CoreResult<()> {
        if set.dir.exists() {
            fs::remove_dir_all(&set.dir)?;
        }
        debug!(dir = %set.dir.display(), "discarded backups");
        Ok(())
    }
}
