// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::error::{Error, Result};
use crate::hash::Sha256Hash;
use crate::recipe::format::{Recipe, is_glob_pattern};
use std::path::{Component, Path};

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::ParseError(format!(
            "Failed to read recipe file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_recipe(&content)
}

/// Validate a recipe for completeness and correctness
///
/// Collects every violated invariant before failing, so an author sees
/// the whole list in one pass. Returns non-fatal warnings on success.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut problems = Vec::new();
    let mut warnings = Vec::new();
    let package = &recipe.package;

    if package.name.trim().is_empty() {
        problems.push("package.name is empty".to_string());
    } else if !package
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
    {
        problems.push(format!(
            "package.name '{}' contains characters outside [A-Za-z0-9._+-]",
            package.name
        ));
    }

    if package.version.trim().is_empty() {
        problems.push("package.version is empty".to_string());
    } else if semver::Version::parse(&package.version).is_err() {
        warnings.push(format!(
            "Version '{}' is not a semantic version",
            package.version
        ));
    }

    check_source_url(&recipe.source_url(), &mut problems);

    if recipe.source.sha256.trim().is_empty() {
        problems.push("source.sha256 is missing".to_string());
    } else if let Err(e) = Sha256Hash::parse(&recipe.source.sha256) {
        problems.push(format!("source.sha256 is malformed ({})", e));
    }

    for dep in &package.requires {
        if dep.trim().is_empty() {
            problems.push("package.requires contains an empty name".to_string());
        }
    }

    if recipe.install_rules.is_empty() {
        warnings.push("No install rules; nothing will be staged".to_string());
    }

    for (index, rule) in recipe.install_rules.iter().enumerate() {
        let at = format!("install[{}]", index);

        if !rule.category.is_valid() {
            problems.push(format!("{}: invalid category '{}'", at, rule.category));
        }

        if rule.sources.is_empty() {
            problems.push(format!("{}: no source patterns", at));
        }

        for pattern in &rule.sources {
            if pattern.trim().is_empty() {
                problems.push(format!("{}: empty source pattern", at));
                continue;
            }
            if !is_contained(pattern) {
                problems.push(format!(
                    "{}: pattern '{}' must be relative and must not contain '..'",
                    at, pattern
                ));
            }
            if is_glob_pattern(pattern) {
                if let Err(e) = glob::Pattern::new(pattern) {
                    problems.push(format!("{}: invalid glob '{}' ({})", at, pattern, e));
                }
            }
        }

        if let Some(dir) = &rule.if_exists {
            if rule.category.is_binary() {
                problems.push(format!("{}: binary rules cannot use if_exists", at));
            } else if dir.trim().is_empty() || !is_contained(dir) {
                problems.push(format!("{}: if_exists '{}' must be a relative path", at, dir));
            }
        }
    }

    match &recipe.test {
        Some(test) if test.command.is_empty() => {
            problems.push("test.command is empty".to_string());
        }
        Some(_) => {}
        None => warnings.push("No test procedure; `test` will have nothing to run".to_string()),
    }

    if let Some(hook) = &recipe.hooks.post_install {
        if hook.is_empty() {
            problems.push("hooks.post_install is empty".to_string());
        }
    }

    if package.description.is_none() {
        warnings.push("Missing package description".to_string());
    }
    if package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }
    if package.homepage.is_none() {
        warnings.push("Missing package homepage".to_string());
    }

    if !problems.is_empty() {
        let name = if package.name.trim().is_empty() {
            "<unnamed>".to_string()
        } else {
            package.name.clone()
        };
        return Err(Error::InvalidRecipe { name, problems });
    }

    Ok(warnings)
}

impl Recipe {
    /// Validate this recipe; see [`validate_recipe`]
    pub fn validate(&self) -> Result<Vec<String>> {
        validate_recipe(self)
    }
}

fn check_source_url(url: &str, problems: &mut Vec<String>) {
    if url.trim().is_empty() {
        problems.push("source.url is empty".to_string());
        return;
    }

    if url.contains("://") {
        match url::Url::parse(url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https" | "file") {
                    problems.push(format!(
                        "source.url scheme '{}' is not supported (http, https, file)",
                        parsed.scheme()
                    ));
                }
            }
            Err(e) => problems.push(format!("source.url '{}' is not a valid URL ({})", url, e)),
        }
    }
}

/// Whether a recipe-supplied path stays inside the tree it is resolved in
fn is_contained(path: &str) -> bool {
    let path = Path::new(path);
    !path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[package]
name = "git-issue"
version = "1.0.2"
description = "Distributed issue tracking system built on Git"
homepage = "https://github.com/remenoscodes/git-issue"
license = "GPL-2.0-only"
requires = ["git"]

[source]
url = "https://example.com/git-issue-v1.0.2.tar.gz"
sha256 = "e0b0fe2bee4c5ae8afe487e0c719706be17aacbcf5ca13caab6a0946022144a1"

[[install]]
sources = ["bin/*"]
category = "binary"

[test]
command = ["%(bin)s/git-issue", "version"]
"#;

    fn problems_of(recipe: &Recipe) -> Vec<String> {
        match validate_recipe(recipe) {
            Err(Error::InvalidRecipe { problems, .. }) => problems,
            other => panic!("expected InvalidRecipe, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_valid_recipe() {
        let recipe = parse_recipe(VALID).unwrap();
        assert_eq!(recipe.package.name, "git-issue");
        let warnings = recipe.validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_parse_invalid_recipe() {
        let content = "this is not valid toml at all {}";
        assert!(matches!(parse_recipe(content), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_parse_missing_file() {
        let result = parse_recipe_file(Path::new("/nonexistent/recipe.toml"));
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_each_required_field_blanked() {
        let blankers: [(&str, fn(&mut Recipe)); 3] = [
            ("package.name", |r| r.package.name.clear()),
            ("package.version", |r| r.package.version.clear()),
            ("source.sha256", |r| r.source.sha256.clear()),
        ];

        for (field, blank) in blankers {
            let mut recipe = parse_recipe(VALID).unwrap();
            blank(&mut recipe);
            let problems = problems_of(&recipe);
            assert!(
                problems.iter().any(|p| p.contains(field)),
                "{} not reported in {:?}",
                field,
                problems
            );
        }
    }

    #[test]
    fn test_missing_tables_reach_validation() {
        let recipe = parse_recipe("[package]\nname = \"x\"\n").unwrap();
        let problems = problems_of(&recipe);
        assert!(problems.iter().any(|p| p.contains("package.version")), "{:?}", problems);
        assert!(problems.iter().any(|p| p.contains("source.url")), "{:?}", problems);
        assert!(problems.iter().any(|p| p.contains("source.sha256")), "{:?}", problems);

        let recipe = parse_recipe("[source]\nurl = \"https://example.com/x.tar.gz\"\n").unwrap();
        let problems = problems_of(&recipe);
        assert!(problems.iter().any(|p| p.contains("package.name")), "{:?}", problems);
        assert!(problems.iter().any(|p| p.contains("package.version")), "{:?}", problems);
    }

    #[test]
    fn test_validate_rejects_guarded_binary_rule() {
        let mut recipe = parse_recipe(VALID).unwrap();
        recipe.install_rules[0].if_exists = Some("bin".to_string());
        let problems = problems_of(&recipe);
        assert!(problems.iter().any(|p| p.contains("binary rules cannot use if_exists")));
    }

    #[test]
    fn test_reports_every_problem_not_just_first() {
        let mut recipe = parse_recipe(VALID).unwrap();
        recipe.package.name.clear();
        recipe.package.version.clear();
        recipe.source.sha256 = "PLACEHOLDER_SHA256".to_string();

        let err = validate_recipe(&recipe).unwrap_err();
        match err {
            Error::InvalidRecipe { name, problems } => {
                assert_eq!(name, "<unnamed>");
                assert_eq!(problems.len(), 3, "{:?}", problems);
                assert!(problems.iter().any(|p| p.contains("malformed")));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_escaping_patterns() {
        let mut recipe = parse_recipe(VALID).unwrap();
        recipe.install_rules[0].sources = vec!["../etc/*".to_string(), "/bin/sh".to_string()];
        let problems = problems_of(&recipe);
        assert_eq!(problems.len(), 2, "{:?}", problems);
    }

    #[test]
    fn test_validate_rejects_bad_glob_and_category() {
        let mut recipe = parse_recipe(VALID).unwrap();
        recipe.install_rules[0].sources = vec!["bin/[".to_string()];
        recipe.install_rules[0].category = "Not/Valid".to_string().into();
        let problems = problems_of(&recipe);
        assert!(problems.iter().any(|p| p.contains("invalid glob")));
        assert!(problems.iter().any(|p| p.contains("invalid category")));
    }

    #[test]
    fn test_validate_rejects_unsupported_scheme() {
        let mut recipe = parse_recipe(VALID).unwrap();
        recipe.source.url = "ftp://example.com/pkg.tar.gz".to_string();
        let problems = problems_of(&recipe);
        assert!(problems.iter().any(|p| p.contains("scheme 'ftp'")));
    }

    #[test]
    fn test_validate_accepts_local_paths() {
        let mut recipe = parse_recipe(VALID).unwrap();
        recipe.source.url = "/srv/artifacts/git-issue.tar.gz".to_string();
        assert!(recipe.validate().is_ok());
        recipe.source.url = "file:///srv/artifacts/git-issue.tar.gz".to_string();
        assert!(recipe.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_test_command() {
        let mut recipe = parse_recipe(VALID).unwrap();
        if let Some(test) = recipe.test.as_mut() {
            test.command.clear();
        }
        let problems = problems_of(&recipe);
        assert!(problems.iter().any(|p| p.contains("test.command")));
    }

    #[test]
    fn test_validate_warnings() {
        let content = r#"
[package]
name = "test"
version = "1.0"

[source]
url = "https://example.com/test.tar.gz"
sha256 = "e0b0fe2bee4c5ae8afe487e0c719706be17aacbcf5ca13caab6a0946022144a1"
"#;

        let recipe = parse_recipe(content).unwrap();
        let warnings = validate_recipe(&recipe).unwrap();
        assert!(warnings.iter().any(|w| w.contains("description")));
        assert!(warnings.iter().any(|w| w.contains("license")));
        assert!(warnings.iter().any(|w| w.contains("semantic version")));
        assert!(warnings.iter().any(|w| w.contains("install rules")));
        assert!(warnings.iter().any(|w| w.contains("test procedure")));
    }
}
