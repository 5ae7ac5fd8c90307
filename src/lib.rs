// src/lib.rs

//! Kettle: declarative package-recipe installer
//!
//! A recipe is a TOML document describing one pre-built release: where to
//! fetch it, the SHA-256 digest it must hash to, which files go where, and
//! how to check the result. Kettle turns that description into a
//! reproducible install under a configurable prefix.
//!
//! # Architecture
//!
//! - Recipes are pure data: new packages are new files, not new code
//! - Verified before use: nothing is extracted or cached until the digest matches
//! - Additive staging: each install rule is all-or-nothing and rolls back on failure
//! - Narrow state: a receipt per installed package, nothing else

pub mod archive;
pub mod cache;
pub mod config;
pub mod dependencies;
mod error;
pub mod fetch;
pub mod hash;
pub mod installer;
pub mod receipt;
pub mod recipe;
pub mod stager;

pub use config::Config;
pub use error::{Error, Result, Stage};
pub use installer::{FailureKind, InstallReport, InstallState, Installer, TestReport};
pub use recipe::{Recipe, parse_recipe, parse_recipe_file};
