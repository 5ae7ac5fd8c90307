// src/stager/layout.rs

//! Destination directory layout under an install prefix

use crate::recipe::Category;
use std::path::{Path, PathBuf};

/// Where each install category lands, rooted at a configurable prefix
///
/// ```
/// use kettle::recipe::Category;
/// use kettle::stager::Layout;
/// use std::path::Path;
///
/// let layout = Layout::new(Path::new("/usr/local"));
/// assert_eq!(layout.bin_dir(), Path::new("/usr/local/bin"));
/// assert_eq!(
///     layout.destination(&Category::Man(1), "git-issue", "1.0.2"),
///     Path::new("/usr/local/share/man/man1")
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    prefix: PathBuf,
}

impl Layout {
    pub fn new(prefix: &Path) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn man_dir(&self, section: u8) -> PathBuf {
        self.prefix.join("share/man").join(format!("man{}", section))
    }

    /// Per-package documentation directory, `share/doc/<name>-<version>`
    pub fn doc_dir(&self, name: &str, version: &str) -> PathBuf {
        self.prefix
            .join("share/doc")
            .join(format!("{}-{}", name, version))
    }

    /// Destination directory for a category
    pub fn destination(&self, category: &Category, name: &str, version: &str) -> PathBuf {
        match category {
            Category::Binary => self.bin_dir(),
            Category::Man(section) => self.man_dir(*section),
            Category::Doc => self.doc_dir(name, version),
            Category::Lib => self.prefix.join("lib"),
            Category::Include => self.prefix.join("include"),
            Category::Share => self.prefix.join("share").join(name),
            Category::Etc => self.prefix.join("etc"),
            Category::Other(dir) => self.prefix.join(dir),
        }
    }
}
