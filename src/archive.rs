// src/archive.rs

//! Release archive extraction
//!
//! Verified artifact bytes are unpacked into a fresh temporary directory.
//! The compression format is detected from magic bytes first and the file
//! name second, so mislabelled downloads still extract.
//!
//! Release tarballs usually wrap everything in one top-level directory
//! (`git-issue-v1.0.2/bin/...`). When the archive contains exactly one
//! directory and nothing else, install rules resolve inside it.

use crate::stager::StagingFailure;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, info};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarXz,
    TarZst,
}

impl ArchiveFormat {
    /// Detect the format from magic bytes, falling back to the file name
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    /// - Tar: `ustar` at offset 257
    pub fn detect(data: &[u8], filename: &str) -> Option<Self> {
        if data.starts_with(&[0x1f, 0x8b]) {
            return Some(Self::TarGz);
        }
        if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            return Some(Self::TarXz);
        }
        if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            return Some(Self::TarZst);
        }
        if data.len() > 262 && &data[257..262] == b"ustar" {
            return Some(Self::Tar);
        }
        Self::from_filename(filename)
    }

    /// Detect the format from a file name
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
            Some(Self::TarXz)
        } else if filename.ends_with(".tar.zst") || filename.ends_with(".tzst") {
            Some(Self::TarZst)
        } else if filename.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
            Self::TarZst => "tar.zst",
        }
    }
}

/// The extracted release tree for one install run
///
/// Owned by the install run; the directory is removed when this value is
/// dropped unless [`ExtractedTree::keep`] is called.
#[derive(Debug)]
pub struct ExtractedTree {
    dir: TempDir,
    root: PathBuf,
}

impl ExtractedTree {
    /// Directory install rules resolve against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Top of the temporary directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Keep the tree on disk (for debugging) and return its location
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}

/// Extract archive bytes into a new temporary directory under `work_dir`
pub fn extract_archive(
    data: &[u8],
    filename: &str,
    work_dir: &Path,
    label: &str,
) -> Result<ExtractedTree, StagingFailure> {
    let format = ArchiveFormat::detect(data, filename).ok_or_else(|| {
        StagingFailure::Extraction {
            reason: format!("unknown archive format: {}", filename),
        }
    })?;

    fs::create_dir_all(work_dir).map_err(|e| StagingFailure::Io {
        path: work_dir.to_path_buf(),
        source: e,
    })?;

    let dir = tempfile::Builder::new()
        .prefix(&format!("kettle-{}-", label))
        .tempdir_in(work_dir)
        .map_err(|e| StagingFailure::Io {
            path: work_dir.to_path_buf(),
            source: e,
        })?;

    debug!(
        "Extracting {} ({}) into {}",
        filename,
        format.name(),
        dir.path().display()
    );

    let reader: Box<dyn Read + '_> = match format {
        ArchiveFormat::Tar => Box::new(data),
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(data)),
        ArchiveFormat::TarXz => Box::new(xz2::read::XzDecoder::new(data)),
        ArchiveFormat::TarZst => {
            let decoder = zstd::Decoder::new(data).map_err(|e| StagingFailure::Extraction {
                reason: format!("failed to create zstd decoder: {}", e),
            })?;
            Box::new(decoder)
        }
    };

    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(dir.path())
        .map_err(|e| StagingFailure::Extraction {
            reason: format!("failed to unpack {}: {}", filename, e),
        })?;

    let root = single_top_level_dir(dir.path())
        .map_err(|e| StagingFailure::Io {
            path: dir.path().to_path_buf(),
            source: e,
        })?
        .unwrap_or_else(|| dir.path().to_path_buf());

    info!("Extracted {} to {}", filename, root.display());
    Ok(ExtractedTree { dir, root })
}

/// The only entry of `dir`, if it is a directory
fn single_top_level_dir(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;

    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        Ok(Some(entries[0].path()))
    } else {
        Ok(None)
    }
}
