// src/fetch/http.rs

//! HTTP(S) artifact downloads
//!
//! The response body is streamed into a named temp file in the download
//! directory and read back once complete. The temp file is dropped on
//! every exit path, so an interrupted transfer never leaves a partial
//! artifact behind.

use super::{FetchError, Fetcher, RetryPolicy};
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Downloads artifacts over HTTP(S) with retry
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    download_dir: PathBuf,
    show_progress: bool,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout
    ///
    /// Downloads land in the system temp directory until
    /// [`HttpFetcher::with_download_dir`] says otherwise.
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kettle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            policy,
            download_dir: std::env::temp_dir(),
            show_progress: false,
        })
    }

    /// Stream downloads into temp files under `dir`
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Show a progress bar while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| classify_request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {} from {}", status, url);
            return Err(if is_transient_status(status) {
                FetchError::transient(url, reason)
            } else {
                FetchError::permanent(url, reason)
            });
        }

        fs::create_dir_all(&self.download_dir).map_err(|e| {
            FetchError::permanent(
                url,
                format!(
                    "failed to create download directory {}: {}",
                    self.download_dir.display(),
                    e
                ),
            )
        })?;

        let mut temp = NamedTempFile::new_in(&self.download_dir).map_err(|e| {
            FetchError::permanent(url, format!("failed to create temp file: {}", e))
        })?;

        let total_size = response.content_length().unwrap_or(0);
        let progress = self.show_progress.then(|| create_progress_bar(total_size, url));

        let downloaded = stream_response_to_file(response, temp.as_file_mut(), progress.as_ref())
            .map_err(|reason| FetchError::transient(url, reason));

        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        let downloaded = downloaded?;
        debug!("Downloaded {} bytes to {}", downloaded, temp.path().display());

        let bytes = fs::read(temp.path()).map_err(|e| {
            FetchError::permanent(url, format!("failed to read downloaded data: {}", e))
        })?;
        Ok(bytes)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        info!("Downloading {}", url);
        let bytes = self.policy.run(url, |_| self.fetch_once(url))?;
        info!("Downloaded {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }
}

/// Server errors and rate limiting may clear up; other statuses will not
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn classify_request_error(url: &str, e: &reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::permanent(url, format!("invalid request: {}", e))
    } else {
        FetchError::transient(url, format!("request failed: {}", e))
    }
}

fn create_progress_bar(size: u64, name: &str) -> ProgressBar {
    let pb = if size > 0 {
        ProgressBar::new(size)
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    let display = name.rsplit('/').next().unwrap_or(name);
    pb.set_message(display.to_string());
    pb
}

/// Stream a response body to a file, never buffering it whole in memory
fn stream_response_to_file(
    mut response: Response,
    file: &mut File,
    progress_bar: Option<&ProgressBar>,
) -> std::result::Result<u64, String> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| format!("failed to read response: {e}"))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| format!("failed to write data: {e}"))?;

        downloaded += bytes_read as u64;
        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    file.flush().map_err(|e| format!("failed to flush data: {e}"))?;
    Ok(downloaded)
}
