// src/commands/fetch.rs

//! Fetch command - download and verify an artifact into the cache

use super::{GlobalOptions, read_recipe};
use anyhow::{Context, Result};
use kettle::Installer;
use std::io::IsTerminal;
use std::path::Path;

pub fn cmd_fetch(global: &GlobalOptions, recipe_path: &Path) -> Result<()> {
    let mut config = global.load_config()?;
    config.progress = std::io::stderr().is_terminal();

    let recipe = read_recipe(recipe_path)?;
    let installer = Installer::from_config(config).context("Failed to set up installer")?;

    println!("Fetching {} from {}", recipe.package.name, recipe.source_url());
    let artifact = installer
        .fetch_verified(&recipe)
        .with_context(|| format!("Failed to fetch {}", recipe.package.name))?;

    println!(
        "\n[COMPLETE] Verified sha256 {} ({} bytes{})",
        artifact.sha256,
        artifact.bytes.len(),
        if artifact.from_cache { ", already cached" } else { "" }
    );
    match &artifact.cache_path {
        Some(path) => println!("  - {}", path.display()),
        None => {
            for warning in &artifact.warnings {
                println!("Warning: {}", warning);
            }
        }
    }
    Ok(())
}
