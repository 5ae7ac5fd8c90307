// src/commands/install.rs

//! Install command - fetch, verify and stage recipes

use super::{GlobalOptions, read_recipe};
use anyhow::{Context, Result};
use kettle::{InstallReport, Installer, Recipe};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

/// Install one or more recipes
///
/// With several recipes, installs run in parallel (`jobs` threads, 0 =
/// auto) and every recipe is attempted; the first failure is returned
/// after all results are printed.
pub fn cmd_install(
    global: &GlobalOptions,
    recipe_paths: &[PathBuf],
    prefix: Option<PathBuf>,
    keep_staging: bool,
    no_deps: bool,
    jobs: usize,
) -> Result<()> {
    let mut config = global.load_config()?;
    if let Some(prefix) = prefix {
        config.prefix = prefix;
    }
    config.keep_staging |= keep_staging;
    if no_deps {
        config.check_dependencies = false;
    }
    // Progress bars only make sense for a single download on a terminal
    config.progress = recipe_paths.len() == 1 && std::io::stderr().is_terminal();

    let recipes = recipe_paths
        .iter()
        .map(|path| read_recipe(path))
        .collect::<Result<Vec<Recipe>>>()?;

    let installer = Installer::from_config(config).context("Failed to set up installer")?;
    println!(
        "Installing {} recipe(s) into {}",
        recipes.len(),
        installer.config().prefix.display()
    );

    if let [recipe] = recipes.as_slice() {
        let report = installer
            .install(recipe)
            .with_context(|| format!("Failed to install {}", recipe.package.name))?;
        print_report(&report);
        return Ok(());
    }

    let results = installer.install_all(&recipes, jobs);
    let mut first_error = None;
    let mut installed = 0;

    for (recipe, result) in recipes.iter().zip(results) {
        match result {
            Ok(report) => {
                installed += 1;
                print_report(&report);
            }
            Err(e) => {
                println!("[FAILED] {} {}: {}", recipe.package.name, recipe.package.version, e);
                if first_error.is_none() {
                    first_error = Some(
                        anyhow::Error::new(e)
                            .context(format!("Failed to install {}", recipe.package.name)),
                    );
                }
            }
        }
    }

    println!("\n{} of {} recipe(s) installed", installed, recipes.len());
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_report(report: &InstallReport) {
    println!(
        "\n[COMPLETE] Installed {} {} ({} file(s){})",
        report.name,
        report.version,
        report.staged_files.len(),
        if report.from_cache { ", cached artifact" } else { "" }
    );
    for file in &report.staged_files {
        println!("  - {}", file.destination.display());
    }
    for rule in &report.skipped_rules {
        println!("  Skipped: {}", rule);
    }
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    if let Some(dir) = &report.staging_dir {
        println!("  Staging directory kept at {}", dir.display());
    }

    info!("Successfully installed {} {}", report.name, report.version);
}
