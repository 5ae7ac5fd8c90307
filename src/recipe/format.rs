// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML documents describing one pre-built release: where to
//! fetch it, the digest it must hash to, which files to stage where, and
//! how to check the result.

use crate::hash::Sha256Hash;
use crate::stager::Layout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A complete recipe for installing a package
///
/// Identity fields default to empty strings so that a recipe missing them
/// still parses and validation can report every problem at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    #[serde(default)]
    pub package: PackageSection,

    /// Release artifact and its digest
    #[serde(default)]
    pub source: SourceSection,

    /// Install rules, applied in declaration order
    #[serde(default, rename = "install")]
    pub install_rules: Vec<InstallRule>,

    /// Self-test run after installation (optional)
    #[serde(default)]
    pub test: Option<TestSection>,

    /// Lifecycle hooks (optional)
    #[serde(default)]
    pub hooks: HookSection,

    /// Variables for substitution (optional)
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

impl Recipe {
    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s` patterns with their values from:
    /// 1. Built-in variables (name, version, prefix, bin, doc, man1)
    /// 2. Custom variables from the [variables] section
    pub fn substitute(&self, template: &str, layout: &Layout) -> String {
        let mut result = self.substitute_identity(template);

        result = result.replace("%(prefix)s", &layout.prefix().to_string_lossy());
        result = result.replace("%(bin)s", &layout.bin_dir().to_string_lossy());
        result = result.replace(
            "%(doc)s",
            &layout
                .doc_dir(&self.package.name, &self.package.version)
                .to_string_lossy(),
        );
        result = result.replace("%(man1)s", &layout.man_dir(1).to_string_lossy());

        for (key, value) in &self.variables {
            result = result.replace(&format!("%({})s", key), value);
        }

        result
    }

    /// Substitute only `%(name)s` and `%(version)s`
    fn substitute_identity(&self, template: &str) -> String {
        template
            .replace("%(version)s", &self.package.version)
            .replace("%(name)s", &self.package.name)
    }

    /// Get the source URL with variables substituted
    pub fn source_url(&self) -> String {
        self.substitute_identity(&self.source.url)
    }

    /// Declared artifact digest, if it is well-formed
    pub fn expected_hash(&self) -> Option<Sha256Hash> {
        Sha256Hash::parse(&self.source.sha256).ok()
    }

    /// Get the archive filename from the URL
    pub fn archive_filename(&self) -> String {
        self.source_url()
            .split('/')
            .next_back()
            .filter(|s| !s.is_empty())
            .unwrap_or("source.tar.gz")
            .to_string()
    }

    /// Host prerequisites that must be present before install
    pub fn dependencies(&self) -> &[String] {
        &self.package.requires
    }

    /// Expected output of the self-test, with variables substituted
    ///
    /// Defaults to the recipe version when the test section omits `expect`.
    pub fn expected_test_output(&self, layout: &Layout) -> Option<String> {
        let test = self.test.as_ref()?;
        let template = test.expect.as_deref().unwrap_or("%(version)s");
        Some(self.substitute(template, layout))
    }
}

/// Package metadata section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    #[serde(default)]
    pub name: String,

    /// Package version
    #[serde(default)]
    pub version: String,

    /// Short description
    #[serde(default)]
    pub description: Option<String>,

    /// Homepage URL
    #[serde(default)]
    pub homepage: Option<String>,

    /// License identifier (SPDX, informational only)
    #[serde(default)]
    pub license: Option<String>,

    /// Names of prerequisites that must already be on the host
    #[serde(default)]
    pub requires: Vec<String>,
}

/// Source artifact section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSection {
    /// Release artifact URL
    ///
    /// Supports `%(version)s` and `%(name)s` substitution.
    /// `file://` URLs and plain paths fetch from the local filesystem.
    #[serde(default)]
    pub url: String,

    /// SHA-256 digest of the artifact (hex, optional `sha256:` prefix)
    #[serde(default)]
    pub sha256: String,
}

/// A single install rule: which files go into which destination category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRule {
    /// Glob patterns relative to the extracted tree
    ///
    /// A pattern without glob metacharacters names a required file.
    pub sources: Vec<String>,

    /// Destination category
    pub category: Category,

    /// Skip the whole rule if this directory is absent from the tree
    ///
    /// Man page categories infer this from the first pattern's literal
    /// directory when it is not given.
    #[serde(default)]
    pub if_exists: Option<String>,
}

impl InstallRule {
    /// Directory whose absence turns this rule into a no-op
    ///
    /// Binary rules are never guarded: they must always match something.
    pub fn guard_dir(&self) -> Option<String> {
        if self.category.is_binary() {
            return None;
        }
        if let Some(dir) = &self.if_exists {
            return Some(dir.clone());
        }
        if !self.category.is_man() {
            return None;
        }
        self.sources.first().and_then(|p| literal_parent(p))
    }

    /// Human-readable label for logs and errors
    pub fn describe(&self) -> String {
        format!("{} <- [{}]", self.category, self.sources.join(", "))
    }
}

/// Whether a pattern contains glob metacharacters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']'])
}

/// Longest leading directory of a pattern free of glob metacharacters
fn literal_parent(pattern: &str) -> Option<String> {
    let mut literal = Vec::new();
    let components: Vec<&str> = pattern.split('/').collect();
    // The last component is the file pattern itself
    for component in &components[..components.len().saturating_sub(1)] {
        if is_glob_pattern(component) {
            break;
        }
        literal.push(*component);
    }
    if literal.is_empty() {
        None
    } else {
        Some(literal.join("/"))
    }
}

/// Destination category for staged files
///
/// An open enumeration: the well-known categories have fixed
/// destinations, anything else is staged under `<prefix>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Binary,
    /// Man page section 1-9
    Man(u8),
    Doc,
    Lib,
    Include,
    Share,
    Etc,
    Other(String),
}

impl Category {
    pub fn is_binary(&self) -> bool {
        matches!(self, Category::Binary)
    }

    pub fn is_man(&self) -> bool {
        matches!(self, Category::Man(_))
    }

    /// Whether the category name can be used as a destination directory
    pub fn is_valid(&self) -> bool {
        match self {
            Category::Man(section) => (1..=9).contains(section),
            Category::Other(name) => {
                !name.is_empty()
                    && name.chars().all(|c| {
                        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
                    })
            }
            _ => true,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Category::Binary => "binary".to_string(),
            Category::Man(section) => format!("man{}", section),
            Category::Doc => "doc".to_string(),
            Category::Lib => "lib".to_string(),
            Category::Include => "include".to_string(),
            Category::Share => "share".to_string(),
            Category::Etc => "etc".to_string(),
            Category::Other(name) => name.clone(),
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        match s.as_str() {
            "binary" | "bin" => Category::Binary,
            "doc" => Category::Doc,
            "lib" => Category::Lib,
            "include" => Category::Include,
            "share" => Category::Share,
            "etc" => Category::Etc,
            other => match other.strip_prefix("man").map(str::parse::<u8>) {
                Some(Ok(section)) => Category::Man(section),
                _ => Category::Other(s),
            },
        }
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.name()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Self-test section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSection {
    /// Command argv; `%(bin)s` and friends are substituted
    pub command: Vec<String>,

    /// Substring the combined output must contain (defaults to the version)
    #[serde(default)]
    pub expect: Option<String>,
}

/// Lifecycle hooks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookSection {
    /// Command argv run after all rules are staged
    #[serde(default)]
    pub post_install: Option<Vec<String>>,
}
