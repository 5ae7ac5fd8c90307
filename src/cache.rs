// src/cache.rs

//! Verified artifact cache
//!
//! Artifacts are stored under their SHA-256 digest, and only after they
//! have been verified. Entries are verified again on every read; a corrupt
//! entry is deleted and reported as a miss so the caller fetches afresh.

use crate::hash::{Sha256Hash, verify_sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache path for a digest
    pub fn path_for(&self, hash: &Sha256Hash) -> PathBuf {
        self.dir.join(format!("sha256_{}", hash.as_str()))
    }

    /// Read a cached artifact, verifying it against `hash`
    pub fn get(&self, hash: &Sha256Hash) -> Option<Vec<u8>> {
        let path = self.path_for(hash);
        let bytes = fs::read(&path).ok()?;

        match verify_sha256(&bytes, hash.as_str()) {
            Ok(()) => {
                debug!("Using cached artifact: {}", path.display());
                Some(bytes)
            }
            Err(e) => {
                warn!("Cached artifact {} is corrupt ({}), discarding", path.display(), e);
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
                None
            }
        }
    }

    /// Store verified bytes under `hash`
    ///
    /// Callers must have verified `bytes` already.
    pub fn put(&self, hash: &Sha256Hash, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        let path = self.path_for(hash);
        temp.persist(&path).map_err(|e| e.error)?;
        debug!("Cached artifact at {}", path.display());
        Ok(path)
    }
}
