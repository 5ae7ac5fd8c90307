// src/installer/mod.rs

//! Installer: drives one recipe from declaration to a verified install
//!
//! An install run moves through a fixed sequence of states:
//!
//! ```text
//! Loaded -> Validated -> Fetched -> Verified -> Staged -> InstallComplete
//! ```
//!
//! and drops to `Failed(kind)` from whichever state it is in when a step
//! fails. Nothing touches the network or the prefix before the recipe has
//! validated, and an artifact that fails verification is neither staged nor
//! cached.

mod process;
mod selftest;

pub use selftest::TestReport;

use crate::archive::extract_archive;
use crate::cache::ArtifactCache;
use crate::config::Config;
use crate::dependencies::{DependencyProbe, NoopProbe, PathProbe};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher, SourceFetcher};
use crate::hash::{Sha256Hash, verify_sha256};
use crate::receipt::{InstallReceipt, JsonReceiptStore, ReceiptStore};
use crate::recipe::Recipe;
use crate::stager::{StagedFile, Stager};
use chrono::Utc;
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Why an install run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidRecipe,
    MissingDependency,
    ArtifactUnavailable,
    HashMismatch,
    StagingFailure,
    Other,
}

impl FailureKind {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::InvalidRecipe { .. } | Error::ParseError(_) => Self::InvalidRecipe,
            Error::MissingDependency { .. } => Self::MissingDependency,
            Error::ArtifactUnavailable { .. } => Self::ArtifactUnavailable,
            Error::HashMismatch { .. } => Self::HashMismatch,
            Error::Staging { .. } => Self::StagingFailure,
            _ => Self::Other,
        }
    }
}

/// Install run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Loaded,
    Validated,
    Fetched,
    Verified,
    Staged,
    InstallComplete,
    Failed(FailureKind),
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Validated => write!(f, "validated"),
            Self::Fetched => write!(f, "fetched"),
            Self::Verified => write!(f, "verified"),
            Self::Staged => write!(f, "staged"),
            Self::InstallComplete => write!(f, "install-complete"),
            Self::Failed(kind) => write!(f, "failed({:?})", kind),
        }
    }
}

/// Summary of a successful install run
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    /// Every state visited, in order
    pub states: Vec<InstallState>,
    pub staged_files: Vec<StagedFile>,
    /// Rules skipped because their guard directory was absent
    pub skipped_rules: Vec<String>,
    pub warnings: Vec<String>,
    /// Whether the artifact came from the verified cache
    pub from_cache: bool,
    pub sha256: String,
    /// Extracted tree retained for debugging
    pub staging_dir: Option<PathBuf>,
}

impl InstallReport {
    pub fn final_state(&self) -> Option<InstallState> {
        self.states.last().copied()
    }
}

/// Verified artifact bytes ready for extraction
#[derive(Debug)]
pub struct VerifiedArtifact {
    pub bytes: Vec<u8>,
    pub sha256: Sha256Hash,
    pub from_cache: bool,
    /// Location in the artifact cache, when caching succeeded
    pub cache_path: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Tracks the state sequence of one run
struct Run<'a> {
    name: &'a str,
    states: Vec<InstallState>,
}

impl<'a> Run<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            states: vec![InstallState::Loaded],
        }
    }

    fn advance(&mut self, state: InstallState) {
        debug!("[{}] -> {}", self.name, state);
        self.states.push(state);
    }

    /// Record a failure and hand the error back
    fn fail(&mut self, error: Error) -> Error {
        let state = InstallState::Failed(FailureKind::of(&error));
        let from = self.states.last().copied().unwrap_or(InstallState::Loaded);
        warn!("[{}] {} -> {}: {}", self.name, from, state, error);
        self.states.push(state);
        error
    }
}

/// Executes recipes against a configured prefix
pub struct Installer {
    config: Config,
    fetcher: Box<dyn Fetcher>,
    probe: Box<dyn DependencyProbe>,
    receipts: Box<dyn ReceiptStore>,
    cache: ArtifactCache,
}

impl Installer {
    pub fn new(
        config: Config,
        fetcher: Box<dyn Fetcher>,
        probe: Box<dyn DependencyProbe>,
        receipts: Box<dyn ReceiptStore>,
    ) -> Self {
        let cache = ArtifactCache::new(&config.cache_dir);
        Self {
            config,
            fetcher,
            probe,
            receipts,
            cache,
        }
    }

    /// Installer with the default collaborators for `config`
    ///
    /// HTTP and local sources, `PATH` lookup for prerequisites (or none
    /// when checks are disabled) and JSON receipts under the state dir.
    pub fn from_config(config: Config) -> Result<Self> {
        let http = HttpFetcher::new(config.http_timeout(), config.retry_policy())?
            .with_download_dir(config.cache_dir.join("downloads"))
            .with_progress(config.progress);
        let fetcher = Box::new(SourceFetcher::new(http));

        let probe: Box<dyn DependencyProbe> = if config.check_dependencies {
            Box::new(PathProbe::new())
        } else {
            Box::new(NoopProbe)
        };
        let receipts = Box::new(JsonReceiptStore::new(&config.state_dir()));

        Ok(Self::new(config, fetcher, probe, receipts))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn receipts(&self) -> &dyn ReceiptStore {
        self.receipts.as_ref()
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Install one recipe
    pub fn install(&self, recipe: &Recipe) -> Result<InstallReport> {
        let name = recipe.package.name.as_str();
        let version = recipe.package.version.as_str();
        let mut run = Run::new(name);
        info!("Installing {} {}", name, version);

        // Loaded -> Validated
        let mut warnings = recipe.validate().map_err(|e| run.fail(e))?;
        for warning in &warnings {
            warn!("[{}] {}", name, warning);
        }
        self.check_dependencies(recipe).map_err(|e| run.fail(e))?;
        run.advance(InstallState::Validated);

        // Validated -> Fetched -> Verified
        let artifact = self.obtain_artifact(recipe, &mut run)?;
        warnings.extend(artifact.warnings.iter().cloned());

        // Verified -> Staged
        let layout = self.config.layout();
        let work_dir = self.config.cache_dir.join("staging");
        let tree = extract_archive(&artifact.bytes, &recipe.archive_filename(), &work_dir, name)
            .map_err(|source| {
                run.fail(Error::Staging {
                    name: name.to_string(),
                    source,
                })
            })?;

        let staged = Stager::new(&layout, name, version)
            .stage(tree.root(), &recipe.install_rules)
            .map_err(|source| {
                run.fail(Error::Staging {
                    name: name.to_string(),
                    source,
                })
            })?;
        run.advance(InstallState::Staged);

        // Staged -> InstallComplete
        if let Some(warning) = self.run_post_install(recipe) {
            warnings.push(warning);
        }

        let receipt = InstallReceipt {
            name: name.to_string(),
            version: version.to_string(),
            prefix: self.config.prefix.clone(),
            installed_files: staged.staged.iter().map(|f| f.destination.clone()).collect(),
            source_url: recipe.source_url(),
            sha256: artifact.sha256.to_string(),
            installed_at: Utc::now(),
            warnings: warnings.clone(),
        };
        if let Err(e) = self.receipts.record(&receipt) {
            warn!("[{}] Failed to record install receipt: {}", name, e);
            warnings.push(format!("failed to record install receipt: {}", e));
        }

        let staging_dir = if self.config.keep_staging {
            let kept = tree.keep();
            info!("[{}] Staging directory kept at {}", name, kept.display());
            Some(kept)
        } else {
            None
        };

        run.advance(InstallState::InstallComplete);
        info!(
            "Installed {} {} ({} files)",
            name,
            version,
            staged.staged.len()
        );

        Ok(InstallReport {
            name: name.to_string(),
            version: version.to_string(),
            states: run.states,
            staged_files: staged.staged,
            skipped_rules: staged.skipped_rules,
            warnings,
            from_cache: artifact.from_cache,
            sha256: artifact.sha256.to_string(),
            staging_dir,
        })
    }

    /// Install independent recipes in parallel
    ///
    /// Results are returned in input order. `jobs` of zero uses rayon's
    /// default thread count.
    pub fn install_all(&self, recipes: &[Recipe], jobs: usize) -> Vec<Result<InstallReport>> {
        let install = || -> Vec<Result<InstallReport>> {
            recipes.par_iter().map(|r| self.install(r)).collect()
        };

        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(install),
            Err(e) => {
                warn!("Failed to build install thread pool ({}), using global pool", e);
                install()
            }
        }
    }

    /// Validate, fetch and verify a recipe's artifact into the cache
    ///
    /// Nothing is staged. Used by `kettle fetch` to warm the cache.
    pub fn fetch_verified(&self, recipe: &Recipe) -> Result<VerifiedArtifact> {
        let mut run = Run::new(&recipe.package.name);
        recipe.validate().map_err(|e| run.fail(e))?;
        run.advance(InstallState::Validated);
        self.obtain_artifact(recipe, &mut run)
    }

    fn check_dependencies(&self, recipe: &Recipe) -> Result<()> {
        if !self.config.check_dependencies {
            debug!("Dependency checks disabled");
            return Ok(());
        }

        let missing = self.probe.missing(recipe.dependencies());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingDependency {
                name: recipe.package.name.clone(),
                missing,
            })
        }
    }

    /// Cache lookup or fetch, then verification
    fn obtain_artifact(&self, recipe: &Recipe, run: &mut Run<'_>) -> Result<VerifiedArtifact> {
        let name = &recipe.package.name;
        let expected = recipe.expected_hash().ok_or_else(|| {
            run.fail(Error::InvalidRecipe {
                name: name.clone(),
                problems: vec!["source.sha256 is not a valid SHA-256 digest".to_string()],
            })
        })?;

        if let Some(bytes) = self.cache.get(&expected) {
            run.advance(InstallState::Fetched);
            run.advance(InstallState::Verified);
            return Ok(VerifiedArtifact {
                bytes,
                cache_path: Some(self.cache.path_for(&expected)),
                sha256: expected,
                from_cache: true,
                warnings: Vec::new(),
            });
        }

        let url = recipe.source_url();
        let bytes = self.fetcher.fetch(&url).map_err(|e| {
            run.fail(Error::ArtifactUnavailable {
                name: name.clone(),
                url: url.clone(),
                attempts: e.attempts,
                reason: e.reason,
            })
        })?;
        run.advance(InstallState::Fetched);

        verify_sha256(&bytes, expected.as_str()).map_err(|e| {
            run.fail(Error::HashMismatch {
                name: name.clone(),
                expected: e.expected,
                actual: e.actual,
            })
        })?;
        run.advance(InstallState::Verified);
        info!("[{}] Verified sha256 {}", name, expected);

        let mut warnings = Vec::new();
        let cache_path = match self.cache.put(&expected, &bytes) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("[{}] Failed to cache artifact: {}", name, e);
                warnings.push(format!("failed to cache artifact: {}", e));
                None
            }
        };

        Ok(VerifiedArtifact {
            bytes,
            sha256: expected,
            from_cache: false,
            cache_path,
            warnings,
        })
    }

    /// Run the post-install hook; a failure becomes a warning
    fn run_post_install(&self, recipe: &Recipe) -> Option<String> {
        let hook = recipe.hooks.post_install.as_ref()?;
        let layout = self.config.layout();
        let argv: Vec<String> = hook.iter().map(|a| recipe.substitute(a, &layout)).collect();
        let timeout = self.config.test_timeout();

        info!("[{}] Running post-install hook", recipe.package.name);
        match process::run_bounded(&argv, &layout.bin_dir(), timeout) {
            Ok(out) if out.success() => {
                debug!("[{}] post-install output: {}", recipe.package.name, out.output.trim());
                None
            }
            Ok(out) => {
                let warning = format!(
                    "post-install hook failed ({}): {}",
                    out.describe_status(timeout),
                    out.output.trim()
                );
                warn!("[{}] {}", recipe.package.name, warning);
                Some(warning)
            }
            Err(e) => {
                let warning = format!("post-install hook could not run: {}", e);
                warn!("[{}] {}", recipe.package.name, warning);
                Some(warning)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::StaticProbe;
    use crate::fetch::FetchError;
    use crate::hash::sha256;
    use crate::receipt::MemoryReceiptStore;
    use crate::recipe::parse_recipe;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves fixed bytes and counts calls
    struct StaticFetcher {
        bytes: Option<Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bytes
                .clone()
                .ok_or_else(|| FetchError::permanent(url, "HTTP 404 Not Found"))
        }
    }

    fn release_archive(reported_version: &str) -> Vec<u8> {
        let script = format!("#!/bin/sh\necho \"git-issue version {}\"\n", reported_version);
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content, mode) in [
            ("git-issue-v1.0.2/bin/git-issue", script.as_bytes(), 0o755),
            ("git-issue-v1.0.2/README.md", b"readme".as_slice(), 0o644),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(mode);
            header.set_cksum();
            builder.append_data(&mut header, path, content).unwrap();
        }
        let tar = builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar).unwrap();
        encoder.finish().unwrap()
    }

    fn recipe(hash: &str, extra: &str) -> Recipe {
        parse_recipe(&format!(
            r#"
[package]
name = "git-issue"
version = "1.0.2"
requires = ["git"]

[source]
url = "https://example.com/git-issue-v%(version)s.tar.gz"
sha256 = "{hash}"

[[install]]
sources = ["bin/*"]
category = "binary"

[[install]]
sources = ["doc/*.1"]
category = "man1"

[[install]]
sources = ["README.md"]
category = "doc"

[test]
command = ["%(bin)s/git-issue", "version"]
{extra}
"#
        ))
        .unwrap()
    }

    struct Fixture {
        _temp: TempDir,
        installer: Installer,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(
        bytes: Option<Vec<u8>>,
        present: &[&str],
        tweak: impl FnOnce(Config) -> Config,
    ) -> Fixture {
        let temp = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let config = tweak(Config::isolated(temp.path()));
        let installer = Installer::new(
            config,
            Box::new(StaticFetcher {
                bytes,
                calls: Arc::clone(&calls),
            }),
            Box::new(StaticProbe::new(present.iter().copied())),
            Box::new(MemoryReceiptStore::new()),
        );
        Fixture {
            _temp: temp,
            installer,
            calls,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_install_then_selftest() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(&sha256(&archive), "");
        let fx = fixture(Some(archive), &["git"], |c| c);

        let report = fx.installer.install(&recipe).unwrap();
        assert_eq!(
            report.states,
            vec![
                InstallState::Loaded,
                InstallState::Validated,
                InstallState::Fetched,
                InstallState::Verified,
                InstallState::Staged,
                InstallState::InstallComplete,
            ]
        );
        assert_eq!(report.skipped_rules.len(), 1);
        assert!(!report.from_cache);

        let prefix = &fx.installer.config().prefix;
        assert!(prefix.join("bin/git-issue").is_file());
        assert!(prefix.join("share/doc/git-issue-1.0.2/README.md").is_file());

        let receipt = fx.installer.receipts().get("git-issue").unwrap().unwrap();
        assert_eq!(receipt.installed_files.len(), 2);
        assert_eq!(receipt.sha256, report.sha256);

        let test = fx.installer.test(&recipe).unwrap();
        assert!(test.output.contains("git-issue version 1.0.2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_selftest_reports_wrong_version() {
        let archive = release_archive("1.0.1");
        let recipe = recipe(&sha256(&archive), "");
        let fx = fixture(Some(archive), &["git"], |c| c);

        fx.installer.install(&recipe).unwrap();
        match fx.installer.test(&recipe) {
            Err(Error::TestFailed { output, expected, .. }) => {
                assert_eq!(expected, "1.0.2");
                assert!(output.contains("git-issue version 1.0.1"));
            }
            other => panic!("expected TestFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_selftest_requires_install() {
        let fx = fixture(None, &["git"], |c| c);
        let recipe = recipe(&"a".repeat(64), "");

        assert!(matches!(
            fx.installer.test(&recipe),
            Err(Error::NotInstalled { .. })
        ));
    }

    #[test]
    fn test_hash_mismatch_stages_nothing() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(&sha256(b"something else"), "");
        let fx = fixture(Some(archive), &["git"], |c| c);

        let err = fx.installer.install(&recipe).unwrap_err();
        assert!(matches!(err, Error::HashMismatch { .. }));
        assert_eq!(FailureKind::of(&err), FailureKind::HashMismatch);

        let config = fx.installer.config();
        assert!(!config.prefix.join("bin").exists());
        let expected = recipe.expected_hash().unwrap();
        assert!(!fx.installer.cache().path_for(&expected).exists());
        assert!(fx.installer.receipts().list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_dependency_checked_before_fetch() {
        let fx = fixture(Some(release_archive("1.0.2")), &[], |c| c);
        let recipe = recipe(&"a".repeat(64), "");

        match fx.installer.install(&recipe) {
            Err(Error::MissingDependency { missing, .. }) => assert_eq!(missing, vec!["git"]),
            other => panic!("expected MissingDependency, got {:?}", other),
        }
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dependency_checks_can_be_disabled() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(&sha256(&archive), "");
        let fx = fixture(Some(archive), &[], |c| c.with_dependency_checks(false));

        assert!(fx.installer.install(&recipe).is_ok());
    }

    #[test]
    fn test_invalid_recipe_never_fetches() {
        let fx = fixture(Some(release_archive("1.0.2")), &["git"], |c| c);
        let recipe = recipe("PLACEHOLDER_SHA256", "");

        assert!(matches!(
            fx.installer.install(&recipe),
            Err(Error::InvalidRecipe { .. })
        ));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unavailable_artifact() {
        let fx = fixture(None, &["git"], |c| c);
        let recipe = recipe(&"a".repeat(64), "");

        match fx.installer.install(&recipe) {
            Err(Error::ArtifactUnavailable { url, attempts, .. }) => {
                assert_eq!(url, "https://example.com/git-issue-v1.0.2.tar.gz");
                assert_eq!(attempts, 1);
            }
            other => panic!("expected ArtifactUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_verified_artifact_reused_from_cache() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(&sha256(&archive), "");
        let fx = fixture(Some(archive), &["git"], |c| c);

        let first = fx.installer.install(&recipe).unwrap();
        let second = fx.installer.install(&recipe).unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.staged_files, second.staged_files);
    }

    #[test]
    fn test_fetch_verified_populates_cache_only() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(&sha256(&archive), "");
        let fx = fixture(Some(archive), &[], |c| c);

        let artifact = fx.installer.fetch_verified(&recipe).unwrap();
        assert!(artifact.cache_path.is_some_and(|p| p.is_file()));
        assert!(!fx.installer.config().prefix.join("bin").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_hook_is_a_warning() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(
            &sha256(&archive),
            "[hooks]\npost_install = [\"sh\", \"-c\", \"echo hook broke; exit 1\"]",
        );
        let fx = fixture(Some(archive), &["git"], |c| c);

        let report = fx.installer.install(&recipe).unwrap();
        assert_eq!(report.final_state(), Some(InstallState::InstallComplete));
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("post-install hook failed") && w.contains("hook broke"))
        );
    }

    #[test]
    fn test_keep_staging_retains_tree() {
        let archive = release_archive("1.0.2");
        let recipe = recipe(&sha256(&archive), "");
        let fx = fixture(Some(archive), &["git"], |c| c.with_keep_staging(true));

        let report = fx.installer.install(&recipe).unwrap();
        let kept = report.staging_dir.unwrap();
        assert!(kept.join("git-issue-v1.0.2/bin/git-issue").is_file());
    }

    #[test]
    fn test_install_all_reports_each_recipe() {
        let archive = release_archive("1.0.2");
        let good = recipe(&sha256(&archive), "");
        let bad = recipe(&sha256(b"other"), "");
        let fx = fixture(Some(archive), &["git"], |c| c);

        let results = fx.installer.install_all(&[good, bad], 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::HashMismatch { .. })));
    }
}
