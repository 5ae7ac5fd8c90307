// src/commands/validate.rs

//! Validate command - check a recipe without touching the network

use super::read_recipe;
use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_validate(recipe_path: &Path) -> Result<()> {
    println!("Reading recipe: {}", recipe_path.display());
    let recipe = read_recipe(recipe_path)?;
    println!("Recipe: {} version {}", recipe.package.name, recipe.package.version);

    let warnings = recipe
        .validate()
        .with_context(|| "Recipe validation failed")?;

    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    println!("Recipe validation passed");
    if warnings.is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", warnings.len());
    }
    Ok(())
}
