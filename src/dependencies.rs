// src/dependencies.rs

//! Host prerequisite checks
//!
//! Recipes name the tools they need (`requires = ["git"]`). The installer
//! does not resolve or install them; it only asks a [`DependencyProbe`]
//! whether each one is present and refuses to continue if any is not.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Answers "is dependency X present on this host"
pub trait DependencyProbe: Send + Sync {
    fn is_present(&self, name: &str) -> bool;

    /// Names from `deps` that are not present, in declaration order
    fn missing(&self, deps: &[String]) -> Vec<String> {
        deps.iter()
            .filter(|dep| !self.is_present(dep))
            .cloned()
            .collect()
    }
}

/// Looks dependencies up as executables on `PATH`
#[derive(Debug, Default, Clone)]
pub struct PathProbe {
    search_path: Option<String>,
}

impl PathProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search the given `PATH`-style string instead of the process `PATH`
    pub fn with_search_path(search_path: impl Into<String>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Location of `name`, if found
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().ok()?;
                which::which_in(name, Some(paths), cwd)
            }
            None => which::which(name),
        };
        found.ok()
    }
}

impl DependencyProbe for PathProbe {
    fn is_present(&self, name: &str) -> bool {
        match self.locate(name) {
            Some(path) => {
                debug!("Dependency {} found at {}", name, path.display());
                true
            }
            None => {
                debug!("Dependency {} not found", name);
                false
            }
        }
    }
}

/// A probe that reports every dependency as present
///
/// Used when dependency checks are disabled (`--no-deps`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProbe;

impl DependencyProbe for NoopProbe {
    fn is_present(&self, _name: &str) -> bool {
        true
    }
}

/// A probe with a fixed set of present dependencies
#[derive(Debug, Default, Clone)]
pub struct StaticProbe {
    present: HashSet<String>,
}

impl StaticProbe {
    pub fn new<I, S>(present: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            present: present.into_iter().map(Into::into).collect(),
        }
    }
}

impl DependencyProbe for StaticProbe {
    fn is_present(&self, name: &str) -> bool {
        self.present.contains(name)
    }
}
