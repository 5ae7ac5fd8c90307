// src/error.rs

//! Error types for the recipe execution engine
//!
//! Every failure an install run can hit maps to one variant here. Each
//! variant carries the recipe name and enough context (expected vs actual
//! hash, matched file counts, captured test output) to diagnose the
//! failure without re-running with extra verbosity.

use crate::stager::StagingFailure;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Install pipeline stage a failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Dependencies,
    Fetch,
    Verify,
    Stage,
    PostInstall,
    Test,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Dependencies => "dependencies",
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Stage => "stage",
            Stage::PostInstall => "post-install",
            Stage::Test => "test",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid recipe '{name}': {}", .problems.join("; "))]
    InvalidRecipe { name: String, problems: Vec<String> },

    #[error("Missing dependencies for '{name}': {}", .missing.join(", "))]
    MissingDependency { name: String, missing: Vec<String> },

    #[error("Artifact unavailable for '{name}' from {url} after {attempts} attempt(s): {reason}")]
    ArtifactUnavailable {
        name: String,
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Hash mismatch for '{name}': expected sha256 {expected}, got {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Staging failed for '{name}': {source}")]
    Staging {
        name: String,
        #[source]
        source: StagingFailure,
    },

    #[error(
        "Test failed for '{name}': expected output containing '{expected}' from `{command}` ({status})\n--- captured output ---\n{output}"
    )]
    TestFailed {
        name: String,
        command: String,
        expected: String,
        status: String,
        output: String,
    },

    #[error("'{name}' version {version} is not installed; run install first")]
    NotInstalled { name: String, version: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unreadable or unwritable install receipt
    #[error("Receipt error: {0}")]
    Receipt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The pipeline stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::InvalidRecipe { .. } => Some(Stage::Validate),
            Error::MissingDependency { .. } => Some(Stage::Dependencies),
            Error::ArtifactUnavailable { .. } => Some(Stage::Fetch),
            Error::HashMismatch { .. } => Some(Stage::Verify),
            Error::Staging { .. } => Some(Stage::Stage),
            Error::TestFailed { .. } | Error::NotInstalled { .. } => Some(Stage::Test),
            Error::Config(_) | Error::ParseError(_) | Error::Receipt(_) | Error::Io(_) => None,
        }
    }

    /// Process exit code for this failure kind
    ///
    /// Distinct per kind so scripts can tell a tampered artifact from a
    /// flaky mirror.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InvalidRecipe { .. } | Error::ParseError(_) => 2,
            Error::ArtifactUnavailable { .. } => 3,
            Error::HashMismatch { .. } => 4,
            Error::Staging { .. } => 5,
            Error::TestFailed { .. } => 6,
            Error::MissingDependency { .. } => 7,
            Error::NotInstalled { .. } => 8,
            Error::Config(_) | Error::Receipt(_) | Error::Io(_) => 1,
        }
    }
}
