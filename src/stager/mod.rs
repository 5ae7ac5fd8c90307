// src/stager/mod.rs

//! Stager: copies files from an extracted artifact into the install layout
//!
//! Install rules are applied in declaration order. Each rule:
//! 1. Checks its guard directory (if any); an absent guard skips the rule
//! 2. Resolves its glob patterns against the extracted tree
//! 3. Writes every matched file to a temporary name next to its
//!    destination, then renames the whole set into place
//!
//! A rule is all-or-nothing: if any copy or rename fails, the files the
//! rule already wrote are removed and any file it overwrote is restored
//! before the failure is returned. Writes are additive, so nothing outside
//! the paths a rule writes is ever touched, and re-running a rule on the
//! same tree produces the same files and permissions.

mod journal;
mod layout;

pub use layout::Layout;

use crate::recipe::{InstallRule, is_glob_pattern};
use journal::Journal;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why staging could not complete
#[derive(Error, Debug)]
pub enum StagingFailure {
    #[error("binary rule matched no files (patterns: {})", .patterns.join(", "))]
    EmptyBinaryInstall { patterns: Vec<String> },

    #[error("required file '{path}' is missing from the artifact (rule {rule})")]
    MissingRequiredFile { rule: String, path: String },

    #[error("failed to extract artifact: {reason}")]
    Extraction { reason: String },

    #[error("filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StagingFailure {
    fn io(path: &Path, source: io::Error) -> Self {
        StagingFailure::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One file written by the stager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Category name of the rule that staged it
    pub category: String,
    /// Path relative to the extracted tree
    pub source: PathBuf,
    /// Absolute destination path
    pub destination: PathBuf,
}

/// Outcome of staging all rules
#[derive(Debug, Clone, Default)]
pub struct StagingResult {
    /// Files written, in rule order
    pub staged: Vec<StagedFile>,
    /// Rules skipped because their guard directory was absent
    pub skipped_rules: Vec<String>,
}

/// Applies install rules for one package into a [`Layout`]
pub struct Stager<'a> {
    layout: &'a Layout,
    name: &'a str,
    version: &'a str,
}

impl<'a> Stager<'a> {
    pub fn new(layout: &'a Layout, name: &'a str, version: &'a str) -> Self {
        Self {
            layout,
            name,
            version,
        }
    }

    /// Stage every rule against `extracted_root`
    ///
    /// Stops at the first failing rule; that rule's writes are rolled back,
    /// rules that already succeeded are left in place.
    pub fn stage(
        &self,
        extracted_root: &Path,
        rules: &[InstallRule],
    ) -> Result<StagingResult, StagingFailure> {
        let mut result = StagingResult::default();

        for rule in rules {
            if let Some(guard) = rule.guard_dir() {
                if !extracted_root.join(&guard).is_dir() {
                    info!(
                        "Skipping rule {} for {}: directory '{}' not in artifact",
                        rule.describe(),
                        self.name,
                        guard
                    );
                    result.skipped_rules.push(rule.describe());
                    continue;
                }
            }

            let staged = self.stage_rule(extracted_root, rule)?;
            result.staged.extend(staged);
        }

        info!(
            "Staged {} file(s) for {}-{} ({} rule(s) skipped)",
            result.staged.len(),
            self.name,
            self.version,
            result.skipped_rules.len()
        );
        Ok(result)
    }

    fn stage_rule(
        &self,
        root: &Path,
        rule: &InstallRule,
    ) -> Result<Vec<StagedFile>, StagingFailure> {
        let matched = resolve_sources(root, rule)?;

        if matched.is_empty() {
            if rule.category.is_binary() {
                return Err(StagingFailure::EmptyBinaryInstall {
                    patterns: rule.sources.clone(),
                });
            }
            debug!("Rule {} matched no files", rule.describe());
            return Ok(Vec::new());
        }

        let dest_dir = self
            .layout
            .destination(&rule.category, self.name, self.version);

        // Later matches with the same file name win, as with a plain copy
        let mut targets: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        for source in matched {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let target = dest_dir.join(file_name);
            if let Some(previous) = targets.insert(target.clone(), source.clone()) {
                warn!(
                    "{} and {} both stage to {}; keeping the latter",
                    previous.display(),
                    source.display(),
                    target.display()
                );
            }
        }

        let mut journal = Journal::new();
        match self.write_all(&mut journal, &dest_dir, &targets, rule) {
            Ok(()) => {}
            Err(e) => {
                let unrestored = journal.rollback();
                if !unrestored.is_empty() {
                    warn!(
                        "Rollback of rule {} left {} path(s) behind",
                        rule.describe(),
                        unrestored.len()
                    );
                }
                return Err(e);
            }
        }

        Ok(targets
            .into_iter()
            .map(|(destination, source)| StagedFile {
                category: rule.category.name(),
                source: source.strip_prefix(root).unwrap_or(&source).to_path_buf(),
                destination,
            })
            .collect())
    }

    /// Two-phase write: copy everything to temp names, then rename into place
    fn write_all(
        &self,
        journal: &mut Journal,
        dest_dir: &Path,
        targets: &BTreeMap<PathBuf, PathBuf>,
        rule: &InstallRule,
    ) -> Result<(), StagingFailure> {
        journal
            .create_dir_all(dest_dir)
            .map_err(|e| StagingFailure::io(dest_dir, e))?;

        let mut pending: Vec<(PathBuf, &PathBuf)> = Vec::with_capacity(targets.len());
        for (target, source) in targets {
            let temp = temp_name(target);
            if let Err(e) = copy_with_mode(source, &temp, rule.category.is_binary()) {
                let _ = fs::remove_file(&temp);
                for (written, _) in &pending {
                    let _ = fs::remove_file(written);
                }
                return Err(StagingFailure::io(target, e));
            }
            pending.push((temp, target));
        }

        let mut remaining = pending.into_iter();
        while let Some((temp, target)) = remaining.next() {
            let renamed = journal
                .record_write(target)
                .and_then(|()| fs::rename(&temp, target));
            if let Err(e) = renamed {
                let _ = fs::remove_file(&temp);
                for (rest, _) in remaining {
                    let _ = fs::remove_file(rest);
                }
                return Err(StagingFailure::io(target, e));
            }
            debug!("Installed {}", target.display());
        }

        Ok(())
    }
}

/// Resolve a rule's patterns to regular files, sorted and deduplicated
fn resolve_sources(root: &Path, rule: &InstallRule) -> Result<Vec<PathBuf>, StagingFailure> {
    let root_str = root.to_str().ok_or_else(|| {
        StagingFailure::io(
            root,
            io::Error::new(io::ErrorKind::InvalidData, "extracted path is not valid UTF-8"),
        )
    })?;
    let escaped_root = glob::Pattern::escape(root_str);

    let mut matched = Vec::new();
    for pattern in &rule.sources {
        if is_glob_pattern(pattern) {
            let full = format!("{}/{}", escaped_root, pattern);
            let entries = glob::glob_with(&full, match_options()).map_err(|e| {
                StagingFailure::MissingRequiredFile {
                    rule: rule.describe(),
                    path: format!("{} (invalid pattern: {})", pattern, e),
                }
            })?;
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => matched.push(path),
                    Ok(_) => {}
                    Err(e) => {
                        let path = e.path().to_path_buf();
                        return Err(StagingFailure::io(&path, e.into_error()));
                    }
                }
            }
        } else {
            let path = root.join(pattern);
            if !path.is_file() {
                return Err(StagingFailure::MissingRequiredFile {
                    rule: rule.describe(),
                    path: pattern.clone(),
                });
            }
            matched.push(path);
        }
    }

    matched.sort();
    matched.dedup();
    Ok(matched)
}

/// `*` and `?` never match a leading dot
fn match_options() -> glob::MatchOptions {
    glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    }
}

fn temp_name(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.kettle-tmp", file_name))
}

/// Copy a file, keeping its permission bits
///
/// Binaries additionally get the owner-execute bit.
fn copy_with_mode(source: &Path, dest: &Path, executable: bool) -> io::Result<()> {
    fs::copy(source, dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut mode = fs::metadata(source)?.permissions().mode() & 0o7777;
        if executable {
            mode |= 0o100;
        }
        fs::set_permissions(dest, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(())
}
