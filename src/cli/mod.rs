// src/cli/mod.rs
//! CLI definitions for kettle
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kettle")]
#[command(author = "Kettle Contributors")]
#[command(version)]
#[command(about = "Declarative package-recipe installer with verified fetches", long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/kettle/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Artifact cache directory (overrides config and KETTLE_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, verify and stage one or more recipes
    Install {
        /// Recipe files
        #[arg(required = true)]
        recipes: Vec<PathBuf>,

        /// Install prefix (binaries go to <prefix>/bin)
        #[arg(short, long)]
        prefix: Option<PathBuf>,

        /// Keep the extracted tree for debugging
        #[arg(long)]
        keep_staging: bool,

        /// Skip the host prerequisite check
        #[arg(long)]
        no_deps: bool,

        /// Parallel installs when several recipes are given (0 = auto)
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
    },

    /// Run a recipe's self-test against its installed files
    Test {
        /// Recipe file
        recipe: PathBuf,

        /// Install prefix the recipe was installed into
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Fetch and verify a recipe's artifact into the cache without installing
    Fetch {
        /// Recipe file
        recipe: PathBuf,
    },

    /// Validate a recipe and show warnings
    Validate {
        /// Recipe file
        recipe: PathBuf,
    },

    /// List installed packages
    List {
        /// Install prefix whose receipts to list
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}
