// src/commands/mod.rs
//! Command handlers for the kettle CLI

mod fetch;
mod install;
mod list;
mod selftest;
mod validate;

pub use fetch::cmd_fetch;
pub use install::cmd_install;
pub use list::cmd_list;
pub use selftest::cmd_test;
pub use validate::cmd_validate;

use anyhow::{Context, Result};
use kettle::{Config, Recipe, parse_recipe_file};
use std::path::{Path, PathBuf};

/// Settings shared by every command
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
}

impl GlobalOptions {
    /// Load the config file and apply global flag overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut config =
            Config::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        Ok(config)
    }
}

/// Read a recipe file, naming it in the error
fn read_recipe(path: &Path) -> Result<Recipe> {
    parse_recipe_file(path).with_context(|| format!("Failed to parse recipe: {}", path.display()))
}
