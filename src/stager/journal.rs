// src/stager/journal.rs

//! Per-rule write journal used to roll back a failed install rule
//!
//! Every destination write is recorded before it happens: new files as
//! `Created`, overwritten files as `Replaced` together with a backup copy
//! taken into a private temporary directory. Rolling back replays the
//! journal in reverse.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug)]
enum Entry {
    CreatedDir(PathBuf),
    Created(PathBuf),
    Replaced { path: PathBuf, backup: PathBuf },
}

/// Write journal for one install rule
pub(crate) struct Journal {
    entries: Vec<Entry>,
    backups: Option<TempDir>,
}

impl Journal {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            backups: None,
        }
    }

    /// Create `dir` and any missing ancestors, recording the ones created
    pub(crate) fn create_dir_all(&mut self, dir: &Path) -> io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if path.exists() {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }

        fs::create_dir_all(dir)?;
        for path in missing.into_iter().rev() {
            self.entries.push(Entry::CreatedDir(path));
        }
        Ok(())
    }

    /// Record that `path` is about to be written
    ///
    /// Takes a backup first if the path already holds a file.
    pub(crate) fn record_write(&mut self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            self.entries.push(Entry::Created(path.to_path_buf()));
            return Ok(());
        }

        if self.backups.is_none() {
            self.backups = Some(
                tempfile::Builder::new()
                    .prefix("kettle-backup-")
                    .tempdir()?,
            );
        }
        let backup_root = match &self.backups {
            Some(dir) => dir.path().to_path_buf(),
            None => return Err(io::Error::other("backup directory unavailable")),
        };

        let backup = backup_root.join(self.entries.len().to_string());
        fs::copy(path, &backup)?;
        self.entries.push(Entry::Replaced {
            path: path.to_path_buf(),
            backup,
        });
        Ok(())
    }

    /// Undo every recorded write, newest first
    ///
    /// Best effort: each step is attempted even if an earlier one failed.
    /// Returns the paths that could not be restored.
    pub(crate) fn rollback(self) -> Vec<PathBuf> {
        let mut failed = Vec::new();

        for entry in self.entries.into_iter().rev() {
            let result = match &entry {
                Entry::Created(path) => fs::remove_file(path),
                Entry::Replaced { path, backup } => fs::copy(backup, path).map(|_| ()),
                // Only empty directories go; anything else was there before us
                Entry::CreatedDir(path) => fs::remove_dir(path),
            };

            match (result, entry) {
                (Ok(()), entry) => debug!("Rolled back {:?}", entry),
                (Err(e), Entry::CreatedDir(path)) => {
                    debug!("Leaving directory {}: {}", path.display(), e);
                }
                (Err(e), Entry::Created(path)) | (Err(e), Entry::Replaced { path, .. }) => {
                    warn!("Failed to roll back {}: {}", path.display(), e);
                    failed.push(path);
                }
            }
        }

        failed
    }
}
