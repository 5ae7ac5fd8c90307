// src/fetch/mod.rs

//! Artifact retrieval
//!
//! A [`Fetcher`] turns a source URL into the artifact's bytes. Transient
//! failures (connection drops, timeouts, 5xx, 429) are retried under a
//! bounded [`RetryPolicy`]; permanent ones (404, unsupported scheme,
//! missing local file) surface on the first attempt.
//!
//! Fetchers know nothing about digests. Verification happens in the
//! installer once the bytes are in hand.

mod http;
mod local;

pub use http::HttpFetcher;
pub use local::LocalFetcher;

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of attempts per URL
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default backoff multiplier
pub const DEFAULT_FACTOR: u32 = 2;

/// Failure to retrieve an artifact
#[derive(Error, Debug, Clone)]
#[error("{reason}")]
pub struct FetchError {
    pub url: String,
    /// Attempts made before giving up
    pub attempts: u32,
    pub reason: String,
    /// Whether another attempt could succeed
    pub transient: bool,
}

impl FetchError {
    pub fn transient(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            attempts: 1,
            reason: reason.into(),
            transient: true,
        }
    }

    pub fn permanent(url: &str, reason: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            attempts: 1,
            reason: reason.into(),
            transient: false,
        }
    }
}

/// Retrieves the bytes behind a URL
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Bounded exponential backoff
///
/// The delay before retry `n` (1-based) is `base_delay * factor^(n-1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            factor: DEFAULT_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            factor: 1,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(self.factor.saturating_pow(exponent))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. The returned error carries
    /// the number of attempts actually made.
    pub fn run<T, F>(&self, url: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Result<T, FetchError>,
    {
        let max_attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(mut e) => {
                    e.attempts = attempt;
                    if !e.transient {
                        debug!("Permanent fetch failure for {}: {}", url, e.reason);
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        return Err(e);
                    }
                    let delay = self.delay(attempt);
                    warn!(
                        "Fetch attempt {} for {} failed: {}, retrying in {:?}...",
                        attempt, url, e.reason, delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

/// Dispatches on URL scheme: HTTP(S) goes to [`HttpFetcher`], `file://`
/// and bare paths to [`LocalFetcher`]
pub struct SourceFetcher {
    http: HttpFetcher,
    local: LocalFetcher,
}

impl SourceFetcher {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            local: LocalFetcher::new(),
        }
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match scheme(url) {
            Some("http") | Some("https") => self.http.fetch(url),
            Some("file") | None => self.local.fetch(url),
            Some(other) => Err(FetchError::permanent(
                url,
                format!("unsupported URL scheme '{}'", other),
            )),
        }
    }
}

/// The scheme of `url`, or `None` for a bare path
fn scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once("://")?;
    Some(scheme).filter(|s| !s.is_empty())
}
