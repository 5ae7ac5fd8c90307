// src/commands/selftest.rs

//! Test command - run a recipe's self-test against its install

use super::{GlobalOptions, read_recipe};
use anyhow::{Context, Result};
use kettle::Installer;
use std::path::{Path, PathBuf};

pub fn cmd_test(global: &GlobalOptions, recipe_path: &Path, prefix: Option<PathBuf>) -> Result<()> {
    let mut config = global.load_config()?;
    if let Some(prefix) = prefix {
        config.prefix = prefix;
    }

    let recipe = read_recipe(recipe_path)?;
    let installer = Installer::from_config(config).context("Failed to set up installer")?;

    println!("Testing {} {}", recipe.package.name, recipe.package.version);
    let report = installer
        .test(&recipe)
        .with_context(|| format!("Self-test failed for {}", recipe.package.name))?;

    println!("  $ {}", report.command);
    for line in report.output.lines() {
        println!("  {}", line);
    }
    println!(
        "[OK] {} {}: output contains '{}'",
        report.name, report.version, report.expected
    );
    Ok(())
}
