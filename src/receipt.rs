// src/receipt.rs

//! Install receipts
//!
//! A receipt records that package X version Y was installed under prefix Z,
//! along with the files staged. It is the only global state the installer
//! keeps, and the `test` operation refuses to run without one.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

/// Record of one completed install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub prefix: PathBuf,
    pub installed_files: Vec<PathBuf>,
    pub source_url: String,
    pub sha256: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl InstallReceipt {
    /// Whether this receipt covers `version` installed under `prefix`
    pub fn matches(&self, version: &str, prefix: &Path) -> bool {
        self.version == version && self.prefix == prefix
    }
}

/// Narrow key-value interface to installed-package state
///
/// Keyed by package name; recording a receipt for a name that already has
/// one replaces it.
pub trait ReceiptStore: Send + Sync {
    fn record(&self, receipt: &InstallReceipt) -> Result<()>;
    fn get(&self, name: &str) -> Result<Option<InstallReceipt>>;
    /// Returns whether a receipt was removed
    fn remove(&self, name: &str) -> Result<bool>;
    /// All receipts, sorted by name
    fn list(&self) -> Result<Vec<InstallReceipt>>;
}

/// Receipts as JSON files, one per package, under `<state_dir>/receipts`
#[derive(Debug, Clone)]
pub struct JsonReceiptStore {
    dir: PathBuf,
}

impl JsonReceiptStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("receipts"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn read(path: &Path) -> Result<InstallReceipt> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Receipt(format!("Invalid receipt {}: {}", path.display(), e))
        })
    }
}

impl ReceiptStore for JsonReceiptStore {
    fn record(&self, receipt: &InstallReceipt) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(receipt)
            .map_err(|e| Error::Receipt(format!("Failed to serialize receipt: {}", e)))?;

        // Write beside the target, then rename over it
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(json.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;

        let path = self.path_for(&receipt.name);
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!("Recorded receipt {}", path.display());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<InstallReceipt>> {
        let path = self.path_for(name);
        match Self::read(&path) {
            Ok(receipt) => Ok(Some(receipt)),
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<InstallReceipt>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut receipts = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                receipts.push(Self::read(&path)?);
            }
        }
        receipts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(receipts)
    }
}

/// In-memory receipt store for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryReceiptStore {
    receipts: Mutex<BTreeMap<String, InstallReceipt>>,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, InstallReceipt>>> {
        self.receipts
            .lock()
            .map_err(|_| Error::Config("receipt store lock poisoned".to_string()))
    }
}

impl ReceiptStore for MemoryReceiptStore {
    fn record(&self, receipt: &InstallReceipt) -> Result<()> {
        self.lock()?.insert(receipt.name.clone(), receipt.clone());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<InstallReceipt>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }

    fn list(&self) -> Result<Vec<InstallReceipt>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}
