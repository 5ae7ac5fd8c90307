// src/hash.rs

//! Content hashing and artifact verification
//!
//! Recipes pin their release artifact with a SHA-256 digest. The digest
//! is always computed over the complete byte stream and compared with a
//! constant-structure comparison: both digests are decoded to bytes and
//! every byte is examined, regardless of where the first difference is.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

/// Hex length of a SHA-256 digest
pub const SHA256_HEX_LEN: usize = 64;

/// Prefix accepted in front of recipe checksums
const SHA256_PREFIX: &str = "sha256:";

/// Hash parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Hash string has wrong length
    InvalidLength { expected: usize, got: usize },
    /// Hash string contains invalid hex characters
    InvalidHex(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { expected, got } => {
                write!(f, "invalid hash length: expected {}, got {}", expected, got)
            }
            Self::InvalidHex(s) => write!(f, "invalid hex in hash: {}", s),
        }
    }
}

impl std::error::Error for HashError {}

/// A validated SHA-256 digest, stored as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Hash {
    value: String,
}

impl Sha256Hash {
    /// Parse a digest, with or without a `sha256:` prefix
    ///
    /// Hex case is ignored; the stored form is lowercase.
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix(SHA256_PREFIX)
            .or_else(|| trimmed.strip_prefix("SHA256:"))
            .unwrap_or(trimmed);

        if hex_part.len() != SHA256_HEX_LEN {
            return Err(HashError::InvalidLength {
                expected: SHA256_HEX_LEN,
                got: hex_part.len(),
            });
        }

        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex(hex_part.to_string()));
        }

        Ok(Self {
            value: hex_part.to_ascii_lowercase(),
        })
    }

    /// Get the digest as a lowercase hex string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Format as a prefixed string (e.g., "sha256:abc123...")
    pub fn to_prefixed_string(&self) -> String {
        format!("{}{}", SHA256_PREFIX, self.value)
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Compute the SHA-256 digest of a byte slice as lowercase hex
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 digest of data from a reader
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verification result error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sha256 mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Compare two hex digests without short-circuiting on the first difference
///
/// Malformed hex on either side never compares equal.
fn digests_equal(actual: &str, expected: &str) -> bool {
    let (Ok(a), Ok(b)) = (hex::decode(actual), hex::decode(expected)) else {
        return false;
    };
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verify bytes match an expected SHA-256 digest
///
/// # Example
/// ```
/// use kettle::hash::verify_sha256;
///
/// let data = b"hello world";
/// let hash = "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9";
/// assert!(verify_sha256(data, hash).is_ok());
/// ```
pub fn verify_sha256(data: &[u8], expected: &str) -> Result<(), VerifyError> {
    let actual = sha256(data);
    check(actual, expected)
}

/// Verify a file matches an expected SHA-256 digest
///
/// Streams the file content to avoid loading it entirely into memory.
pub fn verify_file_sha256(path: &Path, expected: &str) -> Result<(), VerifyError> {
    let mut file = std::fs::File::open(path).map_err(|_| VerifyError {
        expected: expected.to_string(),
        actual: "<file read error>".to_string(),
    })?;

    let actual = hash_reader(&mut file).map_err(|_| VerifyError {
        expected: expected.to_string(),
        actual: "<hash read error>".to_string(),
    })?;

    check(actual, expected)
}

fn check(actual: String, expected: &str) -> Result<(), VerifyError> {
    let expected_hex = Sha256Hash::parse(expected)
        .map(|h| h.as_str().to_string())
        .unwrap_or_else(|_| expected.to_string());

    if digests_equal(&actual, &expected_hex) {
        Ok(())
    } else {
        Err(VerifyError {
            expected: expected_hex,
            actual,
        })
    }
}
