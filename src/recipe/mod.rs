// src/recipe/mod.rs

//! Recipe system for installing pre-built releases
//!
//! A recipe is pure data: the release artifact and its digest, the host
//! prerequisites, the rules that stage files into the install layout, and
//! the self-test that checks the result. New packages are new recipes,
//! never new code.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "git-native-issue"
//! version = "1.0.2"
//! license = "GPL-2.0-only"
//! requires = ["git"]
//!
//! [source]
//! url = "https://github.com/remenoscodes/git-native-issue/releases/download/v%(version)s/git-native-issue-v%(version)s.tar.gz"
//! sha256 = "e0b0fe2bee4c5ae8afe487e0c719706be17aacbcf5ca13caab6a0946022144a1"
//!
//! [[install]]
//! sources = ["bin/*"]
//! category = "binary"
//!
//! [[install]]
//! sources = ["doc/*.1"]
//! category = "man1"
//!
//! [[install]]
//! sources = ["README.md", "LICENSE", "ISSUE-FORMAT.md"]
//! category = "doc"
//!
//! [test]
//! command = ["%(bin)s/git-issue", "version"]
//! ```

mod format;
pub mod parser;

pub use format::{
    Category, HookSection, InstallRule, PackageSection, Recipe, SourceSection, TestSection,
    is_glob_pattern,
};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
