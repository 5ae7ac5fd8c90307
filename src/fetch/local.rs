// src/fetch/local.rs

//! Local artifact source for `file://` URLs and bare paths

use super::{FetchError, Fetcher};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Reads artifacts from the local filesystem
///
/// Every failure is permanent; a missing file will not appear on retry.
#[derive(Debug, Default, Clone)]
pub struct LocalFetcher;

impl LocalFetcher {
    pub fn new() -> Self {
        Self
    }

    fn resolve(url: &str) -> Result<PathBuf, FetchError> {
        if url.starts_with("file://") {
            let parsed = url::Url::parse(url)
                .map_err(|e| FetchError::permanent(url, format!("invalid file URL: {}", e)))?;
            parsed
                .to_file_path()
                .map_err(|()| FetchError::permanent(url, "file URL has no local path"))
        } else {
            Ok(PathBuf::from(url))
        }
    }
}

impl Fetcher for LocalFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = Self::resolve(url)?;
        debug!("Reading local artifact {}", path.display());

        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                FetchError::permanent(url, format!("file not found: {}", path.display()))
            }
            _ => FetchError::permanent(url, format!("failed to read {}: {}", path.display(), e)),
        })
    }
}
