// src/commands/list.rs

//! List command - show recorded install receipts

use super::GlobalOptions;
use anyhow::{Context, Result};
use kettle::receipt::{JsonReceiptStore, ReceiptStore};
use std::path::PathBuf;

pub fn cmd_list(global: &GlobalOptions, prefix: Option<PathBuf>) -> Result<()> {
    let mut config = global.load_config()?;
    if let Some(prefix) = prefix {
        config.prefix = prefix;
    }

    let store = JsonReceiptStore::new(&config.state_dir());
    let mut receipts = store
        .list()
        .with_context(|| format!("Failed to read receipts from {}", store.dir().display()))?;
    receipts.retain(|r| r.prefix == config.prefix);

    if receipts.is_empty() {
        println!("No packages installed under {}", config.prefix.display());
        return Ok(());
    }

    for receipt in &receipts {
        println!(
            "{} {} ({} file(s), installed {})",
            receipt.name,
            receipt.version,
            receipt.installed_files.len(),
            receipt.installed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!("\nTotal: {} package(s)", receipts.len());
    Ok(())
}
