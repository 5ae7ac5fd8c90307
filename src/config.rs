// src/config.rs

//! Installer configuration
//!
//! Loaded from a TOML file (`--config`, else `<config dir>/kettle/config.toml`
//! when present), then overridden by `KETTLE_CACHE_DIR` and finally by CLI
//! flags. Every field has a default, so an empty file is a valid config.
//!
//! ```toml
//! prefix = "/usr/local"
//! cache_dir = "/var/cache/kettle"
//! keep_staging = false
//! check_dependencies = true
//! http_timeout_secs = 30
//! test_timeout_secs = 60
//!
//! [retry]
//! attempts = 3
//! base_delay_ms = 1000
//! factor = 2
//! ```

use crate::error::{Error, Result};
use crate::fetch::RetryPolicy;
use crate::stager::Layout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the artifact cache directory
pub const CACHE_DIR_ENV: &str = "KETTLE_CACHE_DIR";

/// Retry settings for artifact downloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            factor: policy.factor,
        }
    }
}

/// Configuration for the installer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Install prefix; binaries land in `<prefix>/bin`
    pub prefix: PathBuf,
    /// Verified artifact cache
    pub cache_dir: PathBuf,
    /// Receipt storage; defaults to `<prefix>/var/lib/kettle`
    pub state_dir: Option<PathBuf>,
    /// Keep the extracted tree after install (for debugging)
    pub keep_staging: bool,
    /// Refuse to install when a declared prerequisite is missing
    pub check_dependencies: bool,
    /// Show download progress bars
    pub progress: bool,
    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,
    /// Upper bound on the self-test and post-install hook
    pub test_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        let prefix = dirs::home_dir()
            .map(|home| home.join(".local"))
            .unwrap_or_else(|| PathBuf::from("/usr/local"));
        let cache_dir = dirs::cache_dir()
            .map(|dir| dir.join("kettle"))
            .unwrap_or_else(|| std::env::temp_dir().join("kettle-cache"));

        Self {
            prefix,
            cache_dir,
            state_dir: None,
            keep_staging: false,
            check_dependencies: true,
            progress: false,
            http_timeout_secs: 30,
            test_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kettle").join("config.toml"))
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, the default path is
    /// used when present and built-in defaults otherwise. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(default) => Self::from_file(&default)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Parse config TOML
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            debug!("Cache directory overridden by {}: {}", CACHE_DIR_ENV, dir);
            self.cache_dir = PathBuf::from(dir);
        }
    }

    /// Set the install prefix
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the artifact cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the receipt state directory
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Keep extracted trees after install
    pub fn with_keep_staging(mut self, keep: bool) -> Self {
        self.keep_staging = keep;
        self
    }

    /// Enable or disable prerequisite checks
    pub fn with_dependency_checks(mut self, check: bool) -> Self {
        self.check_dependencies = check;
        self
    }

    /// Set the download retry policy
    pub fn with_retry(mut self, policy: &RetryPolicy) -> Self {
        self.retry = RetryConfig {
            attempts: policy.attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            factor: policy.factor,
        };
        self
    }

    /// Configuration rooted entirely inside `root`, for tests and sandboxes
    pub fn isolated(root: &Path) -> Self {
        Self {
            prefix: root.join("prefix"),
            cache_dir: root.join("cache"),
            state_dir: Some(root.join("state")),
            ..Self::default()
        }
    }

    /// Receipt directory parent
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| self.prefix.join("var/lib/kettle"))
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.prefix)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts.max(1),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            factor: self.retry.factor.max(1),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.check_dependencies);
        assert!(!config.keep_staging);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.state_dir(), config.prefix.join("var/lib/kettle"));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
prefix = "/usr/local"
test_timeout_secs = 5

[retry]
attempts = 5
"#,
        )
        .unwrap();

        assert_eq!(config.prefix, PathBuf::from("/usr/local"));
        assert_eq!(config.test_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.factor, 2);
        assert_eq!(config.layout().bin_dir(), PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(Config::parse("prefx = \"/usr\"").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "keep_staging = true\nstate_dir = \"/srv/state\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.keep_staging);
        assert_eq!(config.state_dir(), PathBuf::from("/srv/state"));

        let missing = temp.path().join("missing.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_cache_dir() {
        let mut config = Config::default().with_cache_dir("/from/file");
        config.apply_env(|key| (key == CACHE_DIR_ENV).then(|| "/from/env".to_string()));
        assert_eq!(config.cache_dir, PathBuf::from("/from/env"));

        let mut config = Config::default().with_cache_dir("/from/file");
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.cache_dir, PathBuf::from("/from/file"));
    }

    #[test]
    fn test_builders() {
        let temp = TempDir::new().unwrap();
        let config = Config::isolated(temp.path())
            .with_keep_staging(true)
            .with_dependency_checks(false)
            .with_retry(&RetryPolicy::none());

        assert_eq!(config.prefix, temp.path().join("prefix"));
        assert_eq!(config.state_dir(), temp.path().join("state"));
        assert!(config.keep_staging);
        assert!(!config.check_dependencies);
        assert_eq!(config.retry_policy().attempts, 1);
        assert_eq!(config.retry_policy().base_delay, Duration::ZERO);
    }
}
